//! Salience Filter - keeps walls and shadows out of the decision loop
//!
//! Scene descriptions are scored on a 0-5 scale:
//!
//! | score | meaning                                              |
//! |-------|------------------------------------------------------|
//! | 5     | a person or face is mentioned                        |
//! | 4     | person-state change (appeared, left, expression)     |
//! | 3     | object in active use, or something new appeared      |
//! | 2     | static object not seen before                        |
//! | 1     | familiar object or generic environment               |
//! | 0     | explicit noise (shadows, "unchanged"), suppressed    |
//!
//! Vision updates are event-driven: only real changes (presence, face count,
//! a *stable* expression change, a salient or novel scene) are forwarded,
//! plus a sparse heartbeat while someone is around.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const PERSON_WORDS: &[&str] = &[
    "person", "someone", "man", "woman", "people", "face", "they", "he", "she", "user",
    "sitting", "standing", "looking", "working", "typing",
];

const CHANGE_WORDS: &[&str] = &[
    "appeared", "returned", "left", "gone", "came back", "smiling", "frowning", "angry",
    "surprised", "laughing", "sad", "yawning", "moved closer", "moved away",
];

const ACTIVE_OBJECT_WORDS: &[&str] = &[
    "phone", "cup being", "coffee", "tea", "eating", "drinking", "headphones", "typing",
    "writing", "opened", "closed", "picked up", "put down", "new",
];

const NEW_OBJECT_WORDS: &[&str] = &["new", "appeared", "now there", "wasn't there"];

const STATIC_OBJECTS: &[&str] = &[
    "mug", "cup", "book", "laptop", "monitor", "keyboard", "mouse", "pen", "paper", "bottle",
    "plate", "glass", "chair", "lamp", "plant", "clock",
];

const ENVIRONMENT_WORDS: &[&str] = &["desk", "table", "room", "wall", "floor", "ceiling", "door"];

const NOISE_WORDS: &[&str] = &[
    "shadow", "reflection", "texture", "light on wall", "corner of", "edge of",
    "similar to before", "unchanged", "same as", "nothing new",
];

/// Objects remembered once a salient scene has mentioned them.
const NOTABLE_OBJECTS: &[&str] = &[
    "mug", "cup", "phone", "book", "laptop", "monitor", "keyboard", "mouse", "pen", "bottle", "plate",
];

const EXPRESSION_STABLE: Duration = Duration::from_secs(1);
const EXPRESSION_BUFFER_SPAN: Duration = Duration::from_secs(5);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A vision event worth forwarding downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum VisionEvent {
    PersonAppeared,
    PersonLeft,
    FaceCountChanged,
    ExpressionChanged(String),
    SceneChange(String),
    HighNovelty,
    Heartbeat,
}

impl VisionEvent {
    fn concerns_person(&self) -> bool {
        matches!(self, VisionEvent::PersonAppeared | VisionEvent::PersonLeft)
    }
}

/// Result of a positive gating decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionUpdate {
    /// The highest-priority event; `events[0]`.
    pub event: VisionEvent,
    pub events: Vec<VisionEvent>,
    pub score: u8,
}

struct Reported {
    face_present: Option<bool>,
    face_count: u32,
    expression: String,
    scene: String,
    notable_objects: HashSet<&'static str>,
    last_update: Option<Instant>,
}

struct Inner {
    reported: Reported,
    expression_buffer: VecDeque<(String, Instant)>,
}

pub struct SalienceFilter {
    inner: Mutex<Inner>,
}

impl Default for SalienceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SalienceFilter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                reported: Reported {
                    face_present: None,
                    face_count: 0,
                    expression: "neutral".to_string(),
                    scene: String::new(),
                    notable_objects: HashSet::new(),
                    last_update: None,
                },
                expression_buffer: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Score a scene description for relevance, 0-5, with a short reason.
    pub fn score_description(&self, description: &str) -> (u8, String) {
        let known = self.lock().reported.notable_objects.clone();
        score_with_known(description, &known)
    }

    /// Decide whether a vision poll carries anything worth forwarding.
    pub fn should_send_vision_update(
        &self,
        face_present: bool,
        face_count: u32,
        expression: Option<&str>,
        scene_description: &str,
        novelty: f32,
    ) -> Option<VisionUpdate> {
        let now = Instant::now();
        let mut inner = self.lock();
        let mut events = Vec::new();

        if inner.reported.face_present != Some(face_present) {
            events.push(if face_present {
                VisionEvent::PersonAppeared
            } else {
                VisionEvent::PersonLeft
            });
            inner.reported.face_present = Some(face_present);
        }

        if face_count != inner.reported.face_count {
            events.push(VisionEvent::FaceCountChanged);
            inner.reported.face_count = face_count;
        }

        if let Some(expression) = expression {
            if expression != inner.reported.expression {
                inner.expression_buffer.push_back((expression.to_string(), now));
                if let Some(stable) = stable_expression(&mut inner.expression_buffer, now) {
                    if stable != inner.reported.expression {
                        events.push(VisionEvent::ExpressionChanged(stable.clone()));
                        inner.reported.expression = stable;
                        inner.expression_buffer.clear();
                    }
                }
            } else {
                // Back to what was last reported: any pending run is broken.
                inner.expression_buffer.clear();
            }
        }

        let (mut score, reason) = score_with_known(scene_description, &inner.reported.notable_objects);
        if score >= 3 && scene_description != inner.reported.scene {
            events.push(VisionEvent::SceneChange(reason));
            inner.reported.scene = scene_description.to_string();
            let lower = scene_description.to_lowercase();
            for &obj in NOTABLE_OBJECTS {
                if lower.contains(obj) {
                    inner.reported.notable_objects.insert(obj);
                }
            }
        }

        if novelty > 0.5 && scene_description != inner.reported.scene {
            events.push(VisionEvent::HighNovelty);
            inner.reported.scene = scene_description.to_string();
        }

        let heartbeat_due = inner
            .reported
            .last_update
            .map_or(true, |t| now.duration_since(t) > HEARTBEAT_INTERVAL);
        if events.is_empty() && face_present && heartbeat_due {
            events.push(VisionEvent::Heartbeat);
            score = score.max(1);
        }

        if events.is_empty() {
            return None;
        }

        inner.reported.last_update = Some(now);
        let event = events[0].clone();
        if event.concerns_person() {
            score = score.max(3);
        }
        tracing::debug!(event = ?event, score, "Vision update passed salience gate");
        Some(VisionUpdate { event, events, score })
    }

    /// Scene text for LLM context: full when salient, de-emphasized when
    /// marginal, dropped when it is noise.
    pub fn get_filtered_context(&self, scene_description: &str) -> String {
        let (score, _) = self.score_description(scene_description);
        match score {
            3.. => scene_description.to_string(),
            1 | 2 => format!("(background: {})", scene_description),
            0 => String::new(),
        }
    }
}

fn score_with_known(description: &str, known: &HashSet<&'static str>) -> (u8, String) {
    if description.trim().is_empty() {
        return (0, "empty".to_string());
    }

    let lower = description.to_lowercase();
    let tokens: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .collect();
    let mentions = |cue: &str| -> bool {
        if cue.contains(' ') {
            lower.contains(cue)
        } else {
            tokens.contains(cue) || tokens.contains(format!("{cue}s").as_str())
        }
    };

    let mut score = 0u8;
    let mut reasons: Vec<String> = Vec::new();

    if PERSON_WORDS.iter().copied().any(|w| mentions(w)) {
        score = score.max(5);
        reasons.push("person_detected".to_string());
    }
    if CHANGE_WORDS.iter().copied().any(|w| mentions(w)) {
        score = score.max(4);
        reasons.push("person_change".to_string());
    }
    if ACTIVE_OBJECT_WORDS.iter().copied().any(|w| mentions(w)) {
        score = score.max(3);
        reasons.push("active_object".to_string());
    }
    if NEW_OBJECT_WORDS.iter().copied().any(|w| mentions(w)) {
        score = score.max(3);
        reasons.push("new_item".to_string());
    }

    let static_found: BTreeSet<&str> = STATIC_OBJECTS.iter().copied().filter(|w| mentions(*w)).collect();
    if !static_found.is_empty() {
        let unseen: Vec<&str> = static_found
            .iter()
            .copied()
            .filter(|w| !known.contains(w))
            .collect();
        if unseen.is_empty() {
            score = score.max(1);
            reasons.push("familiar_objects".to_string());
        } else {
            score = score.max(2);
            reasons.push(format!("new_objects: {}", unseen.join(", ")));
        }
    }

    if score < 2 && ENVIRONMENT_WORDS.iter().copied().any(|w| mentions(w)) {
        score = score.max(1);
        reasons.push("environment".to_string());
    }

    if score < 2 && NOISE_WORDS.iter().copied().any(|w| mentions(w)) {
        return (0, "suppressed_irrelevant".to_string());
    }

    if reasons.is_empty() {
        (score, "generic".to_string())
    } else {
        (score, reasons.join(", "))
    }
}

/// The latest buffered expression, if it has held for at least a second.
fn stable_expression(buffer: &mut VecDeque<(String, Instant)>, now: Instant) -> Option<String> {
    while buffer
        .front()
        .is_some_and(|(_, t)| now.duration_since(*t) >= EXPRESSION_BUFFER_SPAN)
    {
        buffer.pop_front();
    }

    let (latest, _) = buffer.back()?;
    let consistent_since = buffer
        .iter()
        .rev()
        .take_while(|(expr, _)| expr == latest)
        .last()
        .map(|(_, t)| *t)?;

    (now.duration_since(consistent_since) >= EXPRESSION_STABLE).then(|| latest.clone())
}
