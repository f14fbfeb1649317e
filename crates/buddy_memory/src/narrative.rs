//! Narrative Engine - the running social story of a session
//!
//! Keeps what Buddy has said and whether anyone answered, the topics Buddy
//! keeps bringing up, how responsive the person is, a factual mood summary,
//! objects on the desk and what Buddy knows about each person. The main
//! product is [`NarrativeEngine::get_narrative_context`], prompt material
//! that lets speech refer back to what already happened.
//!
//! Person profiles and object familiarity survive restarts via a small
//! versioned JSON document; everything else is per session.

use crate::persist::{self, PersistError};
use buddy_core::{
    AttentionLevel, IntentType, NarrativeSignals, Outcome, Pattern, ResponseKind, StateVector, Strategy,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const MAX_UTTERANCES: usize = 10;
const MAX_THREADS: usize = 5;
const MAX_EVENTS: usize = 15;

const ABSENT_AFTER: Duration = Duration::from_secs(300);
const THREAD_CONTEXT_WINDOW: Duration = Duration::from_secs(900);
const THREAD_MOOD_WINDOW: Duration = Duration::from_secs(600);
const EVENT_WINDOW: Duration = Duration::from_secs(300);
const OBJECT_GRACE: Duration = Duration::from_secs(20);
const DOCUMENT_VERSION: u32 = 1;

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("mug", &["mug", "cup", "coffee", "tea"]),
    ("person", &["you", "someone", "person", "they"]),
    ("desk", &["desk", "table", "surface"]),
    ("monitor", &["monitor", "screen", "display"]),
    ("phone", &["phone", "device"]),
    ("book", &["book", "reading"]),
    ("quiet", &["quiet", "silence", "silent"]),
    ("alone", &["alone", "lonely", "nobody", "empty"]),
    ("time", &["morning", "afternoon", "evening", "time", "hour"]),
    ("weather", &["light", "dark", "shadow", "bright"]),
];

const TRACKABLE_OBJECTS: &[(&str, &[&str])] = &[
    ("mug", &["mug", "cup"]),
    ("coffee", &["coffee"]),
    ("phone", &["phone", "cell", "mobile"]),
    ("laptop", &["laptop"]),
    ("monitor", &["monitor", "screen", "display"]),
    ("keyboard", &["keyboard"]),
    ("mouse", &["mouse"]),
    ("book", &["book"]),
    ("pen", &["pen", "pencil"]),
    ("bottle", &["bottle", "water bottle"]),
    ("plate", &["plate"]),
    ("headphones", &["headphones", "earbuds"]),
    ("plant", &["plant"]),
    ("lamp", &["lamp"]),
    ("clock", &["clock"]),
    ("glasses", &["glasses"]),
    ("cat", &["cat"]),
    ("dog", &["dog"]),
];

/// Lowercased text with word lookup; multi-word cues match as phrases.
struct Words {
    lower: String,
    tokens: HashSet<String>,
}

impl Words {
    fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let tokens = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { lower, tokens }
    }

    fn mentions(&self, cue: &str) -> bool {
        if cue.contains(' ') {
            self.lower.contains(cue)
        } else {
            self.tokens.contains(cue) || self.tokens.contains(&format!("{cue}s"))
        }
    }

    fn mentions_any(&self, cues: &[&str]) -> bool {
        cues.iter().any(|c| self.mentions(c))
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Responded,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct UtteranceRecord {
    pub text: String,
    pub at: Instant,
    /// What prompted it ("spontaneous", "reply", ...)
    pub trigger: String,
    pub intent: Option<IntentType>,
    pub response: ResponseStatus,
    pub response_type: Option<ResponseKind>,
    pub response_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct OpenThread {
    pub topic: &'static str,
    pub first_mentioned: Instant,
    pub last_mentioned: Instant,
    pub times_mentioned: u32,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
struct NarrativeEvent {
    event: String,
    reaction: String,
    at: Instant,
}

#[derive(Debug, Clone)]
struct ObjectMemory {
    first_seen: Instant,
    first_seen_wall: DateTime<Utc>,
    last_seen: Instant,
    times_seen: u32,
    mentioned: bool,
    disappeared_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTiming {
    Quick,
    #[default]
    Normal,
    Slow,
}

/// What Buddy has learned about one person across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonProfile {
    pub first_seen: DateTime<Utc>,
    pub interaction_count: u32,
    pub total_responses: u32,
    pub total_ignores: u32,
    /// Running mean of response delay, in seconds.
    pub avg_response_delay: f32,
    pub preferred_timing: ResponseTiming,
    pub responded_to_strategies: BTreeMap<Strategy, u32>,
    pub ignored_strategies: BTreeMap<Strategy, u32>,
    pub last_interaction: DateTime<Utc>,
}

impl Default for PersonProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            first_seen: now,
            interaction_count: 0,
            total_responses: 0,
            total_ignores: 0,
            avg_response_delay: 0.0,
            preferred_timing: ResponseTiming::Normal,
            responded_to_strategies: BTreeMap::new(),
            ignored_strategies: BTreeMap::new(),
            last_interaction: now,
        }
    }
}

impl PersonProfile {
    fn summary(&self) -> Option<String> {
        if self.interaction_count < 3 {
            return None;
        }

        let mut parts = Vec::new();
        let total = self.total_responses + self.total_ignores;
        if total > 0 {
            let rate = self.total_responses as f32 / total as f32;
            if rate > 0.7 {
                parts.push("This person is generally responsive to you.".to_string());
            } else if rate < 0.3 {
                parts.push("This person usually ignores you.".to_string());
            }
        }

        // Ties go to the first strategy in table order.
        let best = self
            .responded_to_strategies
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)));
        if let Some((strategy, _)) = best {
            parts.push(format!(
                "They respond best to: {}",
                strategy.as_str().replace('_', " ")
            ));
        }

        match self.preferred_timing {
            ResponseTiming::Quick => parts.push("They react quickly, so be responsive.".to_string()),
            ResponseTiming::Slow => parts.push("They take time to react, so be patient.".to_string()),
            ResponseTiming::Normal => {}
        }

        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectFamiliarity {
    first_seen: DateTime<Utc>,
    times_seen: u32,
    #[serde(default)]
    mentioned_by_buddy: bool,
}

/// On-disk narrative memory.
#[derive(Debug, Serialize, Deserialize)]
struct NarrativeDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    person_profiles: HashMap<String, PersonProfile>,
    #[serde(default)]
    object_familiarity: BTreeMap<String, ObjectFamiliarity>,
    #[serde(default)]
    session_count: u32,
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug)]
struct Responsiveness {
    last_interaction: Option<Instant>,
    last_verbal_response: Option<Instant>,
    attention_level: AttentionLevel,
    pattern: Pattern,
    ignored_streak: u32,
    face_observed: bool,
    face_present: bool,
    face_present_since: Option<Instant>,
    face_absent_since: Option<Instant>,
}

impl Default for Responsiveness {
    fn default() -> Self {
        Self {
            last_interaction: None,
            last_verbal_response: None,
            attention_level: AttentionLevel::Absent,
            pattern: Pattern::Unknown,
            ignored_streak: 0,
            face_observed: false,
            face_present: false,
            face_present_since: None,
            face_absent_since: None,
        }
    }
}

#[derive(Debug, Default)]
struct NarrativeState {
    utterances: VecDeque<UtteranceRecord>,
    threads: VecDeque<OpenThread>,
    hr: Responsiveness,
    mood: String,
    events: VecDeque<NarrativeEvent>,
    objects: BTreeMap<String, ObjectMemory>,
    profiles: HashMap<String, PersonProfile>,
    current_person: Option<String>,
    last_speech: Option<Instant>,
    total_utterances: u32,
    session_count: u32,
}

impl NarrativeState {
    fn recalculate(&mut self, now: Instant) {
        let responded = self
            .utterances
            .iter()
            .rev()
            .take(5)
            .filter(|u| u.response == ResponseStatus::Responded)
            .count();
        let hr = &mut self.hr;

        hr.attention_level = if !hr.face_present {
            AttentionLevel::Absent
        } else if responded >= 3 {
            AttentionLevel::High
        } else if responded >= 1 {
            AttentionLevel::Medium
        } else {
            AttentionLevel::Low
        };

        hr.pattern = if !hr.face_observed {
            Pattern::Unknown
        } else if !hr.face_present {
            let gone = hr
                .face_absent_since
                .map(|t| now.duration_since(t))
                .unwrap_or(Duration::MAX);
            if gone > ABSENT_AFTER {
                Pattern::Absent
            } else {
                Pattern::JustLeft
            }
        } else if hr.ignored_streak >= 3 {
            Pattern::MostlyIgnoring
        } else if hr.ignored_streak >= 1 && responded < 2 {
            Pattern::Distracted
        } else if responded >= 2 {
            Pattern::Engaging
        } else {
            Pattern::Present
        };
    }

    fn push_event(&mut self, event: &str, reaction: &str, now: Instant) {
        self.events.push_back(NarrativeEvent {
            event: event.to_string(),
            reaction: reaction.to_string(),
            at: now,
        });
        while self.events.len() > MAX_EVENTS {
            self.events.pop_front();
        }
    }

    fn update_threads(&mut self, text: &str, now: Instant) {
        let words = Words::new(text);
        for (topic, keywords) in TOPIC_KEYWORDS {
            if !words.mentions_any(keywords) {
                continue;
            }
            match self.threads.iter_mut().find(|t| t.topic == *topic) {
                Some(thread) => {
                    thread.times_mentioned += 1;
                    thread.last_mentioned = now;
                }
                None => {
                    self.threads.push_back(OpenThread {
                        topic: *topic,
                        first_mentioned: now,
                        last_mentioned: now,
                        times_mentioned: 1,
                        acknowledged: false,
                    });
                    while self.threads.len() > MAX_THREADS {
                        self.threads.pop_front();
                    }
                }
            }
        }
    }

    fn object_context(&self, now: Instant) -> Option<String> {
        let lines: Vec<String> = self
            .objects
            .iter()
            .filter_map(|(name, mem)| {
                let age = short_age(now.duration_since(mem.first_seen));
                if let Some(gone) = mem.disappeared_at {
                    let gone = now.duration_since(gone);
                    (gone < Duration::from_secs(300))
                        .then(|| format!("  - {name}: was here, disappeared {}s ago", gone.as_secs()))
                } else if mem.mentioned {
                    Some(format!("  - {name}: noticed {age} ago (you mentioned it)"))
                } else if mem.times_seen > 3 {
                    Some(format!("  - {name}: been there for {age}, you haven't mentioned it yet"))
                } else {
                    None
                }
            })
            .collect();
        (!lines.is_empty()).then(|| format!("Objects you're aware of:\n{}", lines.join("\n")))
    }

    fn person_context(&self) -> Option<String> {
        let id = self.current_person.as_ref()?;
        self.profiles.get(id)?.summary()
    }
}

/// "12s ago" / "3min ago" / "2h ago"
fn ago(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}min ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

fn short_age(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}min", secs / 60)
    }
}

pub struct NarrativeEngine {
    state: Mutex<NarrativeState>,
    session_start: Instant,
}

impl Default for NarrativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrativeEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NarrativeState {
                session_count: 1,
                ..Default::default()
            }),
            session_start: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NarrativeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- utterances -------------------------------------------------------

    /// Record something Buddy said.
    pub fn record_utterance(&self, text: &str, trigger: &str, intent: Option<IntentType>) {
        let now = Instant::now();
        let mut s = self.lock();
        s.utterances.push_back(UtteranceRecord {
            text: text.to_string(),
            at: now,
            trigger: trigger.to_string(),
            intent,
            response: ResponseStatus::Pending,
            response_type: None,
            response_at: None,
        });
        while s.utterances.len() > MAX_UTTERANCES {
            s.utterances.pop_front();
        }
        s.last_speech = Some(now);
        s.total_utterances += 1;
        s.update_threads(text, now);
    }

    /// The person responded to Buddy's most recent pending utterance.
    pub fn record_response(&self, kind: ResponseKind) {
        let now = Instant::now();
        let mut s = self.lock();
        if let Some(u) = s
            .utterances
            .iter_mut()
            .rev()
            .find(|u| u.response == ResponseStatus::Pending)
        {
            u.response = ResponseStatus::Responded;
            u.response_type = Some(kind);
            u.response_at = Some(now);
        }

        s.hr.last_interaction = Some(now);
        if kind.is_verbal() {
            s.hr.last_verbal_response = Some(now);
        }
        s.hr.ignored_streak = 0;
        s.recalculate(now);
    }

    /// The most recent pending utterance timed out without a response.
    pub fn record_ignored(&self) {
        let now = Instant::now();
        let mut s = self.lock();
        if let Some(u) = s
            .utterances
            .iter_mut()
            .rev()
            .find(|u| u.response == ResponseStatus::Pending)
        {
            u.response = ResponseStatus::Ignored;
        }
        s.hr.ignored_streak += 1;
        tracing::debug!(streak = s.hr.ignored_streak, "Utterance ignored");
        s.recalculate(now);
    }

    /// The person spoke, whether or not it was to Buddy.
    pub fn record_human_speech(&self) {
        let now = Instant::now();
        let mut s = self.lock();
        s.hr.last_interaction = Some(now);
        s.hr.last_verbal_response = Some(now);
        s.hr.ignored_streak = s.hr.ignored_streak.saturating_sub(1);
        s.recalculate(now);
    }

    pub fn acknowledge_thread(&self, topic: &str) {
        let mut s = self.lock();
        if let Some(t) = s.threads.iter_mut().find(|t| t.topic == topic) {
            t.acknowledged = true;
        }
    }

    pub fn open_threads(&self) -> Vec<OpenThread> {
        self.lock().threads.iter().cloned().collect()
    }

    pub fn utterances(&self) -> Vec<UtteranceRecord> {
        self.lock().utterances.iter().cloned().collect()
    }

    // ---- presence ---------------------------------------------------------

    pub fn update_face_state(&self, face_present: bool) {
        let now = Instant::now();
        let mut s = self.lock();
        let was_present = s.hr.face_present;
        s.hr.face_observed = true;

        if face_present && !was_present {
            s.hr.face_present = true;
            s.hr.face_present_since = Some(now);
            s.push_event("person_appeared", "noticed", now);
            tracing::debug!("Person appeared");
        } else if !face_present && was_present {
            s.hr.face_present = false;
            s.hr.face_absent_since = Some(now);
            s.push_event("person_left", "noticed_absence", now);
            tracing::debug!("Person left");
        }
        s.recalculate(now);
    }

    pub fn record_event(&self, event: &str, reaction: &str) {
        let now = Instant::now();
        self.lock().push_event(event, reaction, now);
    }

    // ---- mood -------------------------------------------------------------

    /// Rebuild the factual mood summary from the current state vector.
    pub fn update_mood_narrative(&self, state: &StateVector) {
        let now = Instant::now();
        let mut s = self.lock();
        s.recalculate(now);
        let hr = &s.hr;
        let mut parts: Vec<String> = Vec::new();

        if state.valence > 0.3 {
            let cause = if hr.pattern == Pattern::Engaging {
                "conversation"
            } else if hr.face_present {
                "company"
            } else {
                "internal"
            };
            parts.push(format!("Mood: positive (cause: {cause})"));
        } else if state.valence < -0.2 {
            if hr.pattern == Pattern::MostlyIgnoring {
                parts.push("Mood: deflated (cause: being ignored)".to_string());
            } else if hr.pattern == Pattern::Absent {
                let gone = hr.face_absent_since.map(|t| now.duration_since(t).as_secs()).unwrap_or(0);
                parts.push(format!("Mood: low (cause: alone {}min)", gone / 60));
            } else if state.social > 0.6 {
                parts.push("Mood: low (cause: social need unmet)".to_string());
            } else {
                parts.push("Mood: low (cause: unclear)".to_string());
            }
        } else if state.arousal > 0.6 {
            parts.push("Mood: neutral-alert, watchful".to_string());
        } else if state.energy < 0.3 {
            parts.push("Mood: neutral-low, energy depleted".to_string());
        } else {
            parts.push("Mood: neutral".to_string());
        }

        if hr.ignored_streak >= 3 {
            parts.push(format!("Ignored {}x consecutively, zero responses", hr.ignored_streak));
        } else if hr.ignored_streak >= 1 {
            parts.push("Last utterance: no response".to_string());
        }

        if hr.face_present {
            let since = hr.face_present_since.map(|t| now.duration_since(t).as_secs()).unwrap_or(0);
            if since > 300 {
                parts.push(format!("Person present: {}min", since / 60));
            } else if since > 30 {
                parts.push(format!("Person present: {since}s"));
            }
        } else if let Some(t) = hr.face_absent_since {
            let gone = now.duration_since(t).as_secs();
            if gone > 600 {
                parts.push(format!("Alone: {}min", gone / 60));
            }
        }

        let unresolved: Vec<&str> = s
            .threads
            .iter()
            .filter(|t| {
                !t.acknowledged
                    && t.times_mentioned >= 2
                    && now.duration_since(t.last_mentioned) < THREAD_MOOD_WINDOW
            })
            .take(2)
            .map(|t| t.topic)
            .collect();
        if !unresolved.is_empty() {
            parts.push(format!("Unacknowledged topics: {}", unresolved.join(", ")));
        }

        if state.stimulation > 0.7 {
            parts.push("Stimulation need: high (understimulated)".to_string());
        } else if state.stimulation > 0.5 {
            parts.push("Stimulation need: moderate".to_string());
        }

        s.mood = parts.join(" | ");
    }

    pub fn mood_narrative(&self) -> String {
        self.lock().mood.clone()
    }

    // ---- context ----------------------------------------------------------

    /// Everything the speech model should know about the session so far.
    pub fn get_narrative_context(&self) -> String {
        let now = Instant::now();
        let mut s = self.lock();
        s.recalculate(now);
        let mut sections: Vec<String> = Vec::new();

        if !s.utterances.is_empty() {
            let lines: Vec<String> = s
                .utterances
                .iter()
                .map(|u| {
                    let response = match (u.response, u.response_type) {
                        (_, Some(kind)) => kind.as_str(),
                        (ResponseStatus::Pending, None) => "pending",
                        (ResponseStatus::Responded, None) => "responded",
                        (ResponseStatus::Ignored, None) => "ignored",
                    };
                    let mut text: String = u.text.chars().take(80).collect();
                    if u.text.chars().count() > 80 {
                        text.push_str("...");
                    }
                    format!(
                        "  - \"{text}\" ({}, response: {response})",
                        ago(now.duration_since(u.at))
                    )
                })
                .collect();
            sections.push(format!("What you've said recently:\n{}", lines.join("\n")));
        }

        let threads: Vec<String> = s
            .threads
            .iter()
            .filter(|t| {
                !t.acknowledged
                    && t.times_mentioned >= 2
                    && now.duration_since(t.last_mentioned) < THREAD_CONTEXT_WINDOW
            })
            .map(|t| {
                format!(
                    "  - {} (mentioned {}x over {}, no response)",
                    t.topic,
                    t.times_mentioned,
                    short_age(now.duration_since(t.first_mentioned))
                )
            })
            .collect();
        if !threads.is_empty() {
            sections.push(format!("Topics you've brought up:\n{}", threads.join("\n")));
        }

        let hr = &s.hr;
        let mut resp: Vec<String> = Vec::new();
        if hr.face_present {
            let since = hr.face_present_since.map(|t| now.duration_since(t).as_secs()).unwrap_or(0);
            if since > 60 {
                resp.push(format!("Person has been here {} minutes.", since / 60));
            } else {
                resp.push(format!("Person arrived {since} seconds ago."));
            }
        } else if let Some(t) = hr.face_absent_since {
            let gone = now.duration_since(t).as_secs();
            if gone > 60 {
                resp.push(format!("You've been alone for {} minutes.", gone / 60));
            } else {
                resp.push(format!("Person left {gone} seconds ago."));
            }
        } else {
            resp.push("Nobody is around.".to_string());
        }
        resp.push(format!(
            "Their attention level: {}. Pattern: {}.",
            hr.attention_level, hr.pattern
        ));
        if hr.ignored_streak > 0 {
            resp.push(format!("You've been ignored {} times in a row.", hr.ignored_streak));
        }
        sections.push(format!("Human responsiveness:\n  {}", resp.join(" ")));

        if !s.mood.is_empty() {
            sections.push(format!("Your internal state: {}", s.mood));
        }

        if let Some(objects) = s.object_context(now) {
            sections.push(objects);
        }

        let recent: Vec<&NarrativeEvent> = s
            .events
            .iter()
            .filter(|e| now.duration_since(e.at) < EVENT_WINDOW)
            .collect();
        if !recent.is_empty() {
            let skip = recent.len().saturating_sub(5);
            let lines: Vec<String> = recent[skip..]
                .iter()
                .map(|e| {
                    format!(
                        "  - {} ({}, you {})",
                        e.event.replace('_', " "),
                        ago(now.duration_since(e.at)),
                        e.reaction.replace('_', " ")
                    )
                })
                .collect();
            sections.push(format!("Recent events:\n{}", lines.join("\n")));
        }

        if let Some(person) = s.person_context() {
            sections.push(format!("What you know about this person:\n  {person}"));
        }

        let session_min = now.duration_since(self.session_start).as_secs() / 60;
        if session_min > 0 {
            sections.push(format!(
                "Session: {session_min} minutes, {} things said.",
                s.total_utterances
            ));
        }

        sections.join("\n\n")
    }

    // ---- objects ----------------------------------------------------------

    /// Scan a scene description for trackable objects. Returns events such as
    /// `mug_appeared`, `phone_disappeared` or `mug_returned_after_42s`.
    pub fn update_object_memory(&self, scene_description: &str) -> Vec<String> {
        let now = Instant::now();
        let words = Words::new(scene_description);
        let mut s = self.lock();
        let mut events = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (name, keywords) in TRACKABLE_OBJECTS {
            if !words.mentions_any(keywords) {
                continue;
            }
            seen.insert(*name);
            match s.objects.get_mut(*name) {
                Some(mem) => {
                    mem.last_seen = now;
                    mem.times_seen += 1;
                    if let Some(gone) = mem.disappeared_at.take() {
                        events.push(format!("{name}_returned_after_{}s", now.duration_since(gone).as_secs()));
                    }
                }
                None => {
                    s.objects.insert(
                        name.to_string(),
                        ObjectMemory {
                            first_seen: now,
                            first_seen_wall: Utc::now(),
                            last_seen: now,
                            times_seen: 1,
                            mentioned: false,
                            disappeared_at: None,
                        },
                    );
                    events.push(format!("{name}_appeared"));
                }
            }
        }

        for (name, mem) in s.objects.iter_mut() {
            if !seen.contains(name.as_str())
                && mem.disappeared_at.is_none()
                && now.duration_since(mem.last_seen) > OBJECT_GRACE
            {
                mem.disappeared_at = Some(now);
                events.push(format!("{name}_disappeared"));
            }
        }

        events
    }

    /// Mark remembered objects that Buddy's speech refers to.
    pub fn mark_object_mentioned(&self, text: &str) {
        let words = Words::new(text);
        let mut s = self.lock();
        for (name, keywords) in TRACKABLE_OBJECTS {
            if let Some(mem) = s.objects.get_mut(*name) {
                if words.mentions_any(keywords) {
                    mem.mentioned = true;
                }
            }
        }
    }

    pub fn get_object_context(&self) -> String {
        self.lock().object_context(Instant::now()).unwrap_or_default()
    }

    // ---- people -----------------------------------------------------------

    pub fn set_current_person(&self, person_id: Option<&str>) {
        let mut s = self.lock();
        s.current_person = person_id.filter(|p| !p.is_empty()).map(str::to_string);
        if let Some(id) = s.current_person.clone() {
            s.profiles.entry(id).or_default();
        }
    }

    pub fn current_person(&self) -> Option<String> {
        self.lock().current_person.clone()
    }

    /// Update the current person's profile with how they reacted.
    pub fn record_person_response(&self, outcome: Outcome, strategy: Option<Strategy>, delay_secs: f32) {
        let mut s = self.lock();
        let Some(id) = s.current_person.clone() else {
            return;
        };
        let Some(p) = s.profiles.get_mut(&id) else {
            return;
        };
        p.interaction_count += 1;
        p.last_interaction = Utc::now();

        if outcome.is_response() {
            p.total_responses += 1;
            if let Some(strategy) = strategy {
                *p.responded_to_strategies.entry(strategy).or_insert(0) += 1;
            }
            if delay_secs > 0.0 {
                let n = p.total_responses as f32;
                p.avg_response_delay = (p.avg_response_delay * (n - 1.0) + delay_secs) / n;
                p.preferred_timing = if p.avg_response_delay < 3.0 {
                    ResponseTiming::Quick
                } else if p.avg_response_delay > 8.0 {
                    ResponseTiming::Slow
                } else {
                    ResponseTiming::Normal
                };
            }
        } else {
            p.total_ignores += 1;
            if let Some(strategy) = strategy {
                *p.ignored_strategies.entry(strategy).or_insert(0) += 1;
            }
        }
    }

    pub fn person_profile(&self, person_id: &str) -> Option<PersonProfile> {
        self.lock().profiles.get(person_id).cloned()
    }

    pub fn get_person_context(&self) -> String {
        self.lock().person_context().unwrap_or_default()
    }

    // ---- accessors --------------------------------------------------------

    pub fn ignored_streak(&self) -> u32 {
        self.lock().hr.ignored_streak
    }

    pub fn pattern(&self) -> Pattern {
        let mut s = self.lock();
        s.recalculate(Instant::now());
        s.hr.pattern
    }

    pub fn attention_level(&self) -> AttentionLevel {
        let mut s = self.lock();
        s.recalculate(Instant::now());
        s.hr.attention_level
    }

    pub fn person_present(&self) -> bool {
        self.lock().hr.face_present
    }

    pub fn signals(&self) -> NarrativeSignals {
        let mut s = self.lock();
        s.recalculate(Instant::now());
        NarrativeSignals {
            person_present: s.hr.face_present,
            ignored_streak: s.hr.ignored_streak,
            pattern: s.hr.pattern,
            attention_level: s.hr.attention_level,
        }
    }

    pub fn time_since_last_utterance(&self) -> Option<Duration> {
        self.lock().last_speech.map(|t| Instant::now().duration_since(t))
    }

    pub fn time_since_last_verbal_response(&self) -> Option<Duration> {
        self.lock().hr.last_verbal_response.map(|t| Instant::now().duration_since(t))
    }

    pub fn time_since_last_interaction(&self) -> Option<Duration> {
        self.lock().hr.last_interaction.map(|t| Instant::now().duration_since(t))
    }

    /// How long the current person has been in view.
    pub fn time_since_arrival(&self) -> Option<Duration> {
        let s = self.lock();
        if !s.hr.face_present {
            return None;
        }
        s.hr.face_present_since.map(|t| Instant::now().duration_since(t))
    }

    pub fn session_count(&self) -> u32 {
        self.lock().session_count
    }

    // ---- persistence ------------------------------------------------------

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let doc = {
            let s = self.lock();
            NarrativeDocument {
                version: DOCUMENT_VERSION,
                saved_at: Utc::now(),
                person_profiles: s.profiles.clone(),
                object_familiarity: s
                    .objects
                    .iter()
                    .map(|(name, mem)| {
                        (
                            name.clone(),
                            ObjectFamiliarity {
                                first_seen: mem.first_seen_wall,
                                times_seen: mem.times_seen,
                                mentioned_by_buddy: mem.mentioned,
                            },
                        )
                    })
                    .collect(),
                session_count: s.session_count,
            }
        };
        persist::write_json_atomic(path, &doc)?;
        tracing::info!(
            profiles = doc.person_profiles.len(),
            session = doc.session_count,
            "Narrative memory saved"
        );
        Ok(())
    }

    /// Restore profiles and object familiarity. Returns false (and keeps a
    /// fresh state) when the document is missing, unreadable or from another
    /// version.
    pub fn load(&self, path: &Path) -> bool {
        let doc = match persist::read_json::<NarrativeDocument>(path) {
            Ok(Some(doc)) if doc.version == DOCUMENT_VERSION => doc,
            Ok(Some(doc)) => {
                tracing::warn!(
                    "{}",
                    PersistError::Version {
                        found: doc.version,
                        expected: DOCUMENT_VERSION
                    }
                );
                return false;
            }
            Ok(None) => {
                tracing::info!("No saved narrative memory, starting fresh");
                return false;
            }
            Err(e) => {
                tracing::warn!("Narrative memory unreadable, starting fresh: {}", e);
                return false;
            }
        };

        let now = Instant::now();
        let wall_now = Utc::now();
        let mut s = self.lock();
        let profiles = doc.person_profiles.len();
        s.profiles.extend(doc.person_profiles);
        for (name, fam) in doc.object_familiarity {
            let age = (wall_now - fam.first_seen).to_std().unwrap_or(Duration::ZERO);
            s.objects.entry(name).or_insert(ObjectMemory {
                first_seen: now.checked_sub(age).unwrap_or(now),
                first_seen_wall: fam.first_seen,
                last_seen: now,
                times_seen: fam.times_seen,
                mentioned: fam.mentioned_by_buddy,
                disappeared_at: None,
            });
        }
        s.session_count = doc.session_count + 1;
        tracing::info!(profiles, session = s.session_count, "Narrative memory loaded");
        true
    }
}
