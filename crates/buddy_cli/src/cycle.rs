//! One decision cycle: sensor frame in, cycle report out.
//!
//! The orchestrator owns one of each component and passes snapshots
//! between them. It never holds two component locks at once.

use crate::frame::{CycleReport, PromptMaterial, SensorFrame};
use buddy_core::{BuddyConfig, IntentType, Outcome, ResponseKind, StateVector, Strategy};
use buddy_expression::{
    calculate_speech_delay, get_post_speech_arc, get_pre_speech_arc, get_resolution_arc, ActuatorCommand,
    CommandStep, PhysicalExpressionManager, Pose,
};
use buddy_memory::{ConsciousnessSubstrate, Experience, NarrativeEngine};
use buddy_perception::{AttentionConfig, AttentionDetector, AttentionState, SalienceFilter};
use buddy_reasoning::{
    should_speak_or_physical, strategy_guidance, EngagementPhase, EngagementStatus, IntentBias,
    IntentManager, Modality, NextAction,
};
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Voice activity above this counts as the person talking.
const SPEECH_THRESHOLD: f32 = 0.5;

/// What Buddy last attempted, kept until the outcome arrives.
#[derive(Debug, Clone, Copy)]
struct Attempt {
    intent: Option<IntentType>,
    strategy: Option<Strategy>,
    streak_before: u32,
    valence_before: f32,
}

pub struct Orchestrator {
    attention: AttentionDetector,
    salience: SalienceFilter,
    narrative: NarrativeEngine,
    substrate: ConsciousnessSubstrate,
    intents: IntentManager,
    expressions: PhysicalExpressionManager,
    narrative_path: PathBuf,
    pose: Pose,
    /// End of the movement last sent to the actuators. Attention stays
    /// frozen until the first frame after it.
    moving_until: Option<Instant>,
    was_present: bool,
    last_attempt: Option<Attempt>,
    rng: StdRng,
}

impl Orchestrator {
    pub fn new(config: &BuddyConfig, rng: StdRng) -> Self {
        Self {
            attention: AttentionDetector::new(AttentionConfig::default()),
            salience: SalienceFilter::new(),
            narrative: NarrativeEngine::new(),
            substrate: ConsciousnessSubstrate::from_config(config, None),
            intents: IntentManager::new(),
            expressions: PhysicalExpressionManager::new(),
            narrative_path: config.paths.narrative_path(),
            pose: Pose::default(),
            moving_until: None,
            was_present: false,
            last_attempt: None,
            rng,
        }
    }

    /// Restore persisted state and optionally start the substrate worker.
    pub fn start(&self, worker: bool) {
        let restored = self.substrate.load();
        let narrative = self.narrative.load(&self.narrative_path);
        info!(
            consciousness = restored,
            narrative,
            sessions = self.narrative.session_count(),
            "Buddy state loaded"
        );
        if worker {
            self.substrate.start();
        }
    }

    /// Stop the worker (bounded) and write both memories to disk.
    pub async fn shutdown(&self) {
        self.substrate.stop().await;
        if let Err(e) = self.substrate.save() {
            warn!("Failed to save consciousness state: {}", e);
        }
        if let Err(e) = self.narrative.save(&self.narrative_path) {
            warn!("Failed to save narrative memory: {}", e);
        }
    }

    pub async fn process(&mut self, frame: SensorFrame) -> CycleReport {
        let state = frame.state.normalized();
        let mut steps = Vec::new();

        // ---- perception ----
        self.settle_movement();
        let was_attentive = self.attention.is_attentive();
        let attention = self.attention.update(frame.face_detected, frame.facing_camera);
        if attention == AttentionState::Attentive && !was_attentive {
            steps.extend(self.expressions.attention_ready_commands(self.pose));
        }

        let heard = frame.speech_probability.unwrap_or(0.0) >= SPEECH_THRESHOLD;
        let listen = heard && self.attention.can_trigger_listen();
        if listen {
            self.attention.record_listen_triggered();
        }

        self.narrative.update_face_state(frame.face_detected);
        if self.was_present && !frame.face_detected {
            self.intents.person_departed();
        }
        self.was_present = frame.face_detected;
        self.narrative.set_current_person(frame.person_id.as_deref());

        let vision = frame.vision.as_ref().and_then(|v| {
            self.salience.should_send_vision_update(
                frame.face_detected,
                v.face_count,
                v.expression.as_deref(),
                &v.scene,
                v.novelty,
            )
        });
        let scene = frame.vision.as_ref().map(|v| v.scene.clone()).unwrap_or_default();
        if !scene.is_empty() {
            let new_objects = self.narrative.update_object_memory(&scene);
            if !new_objects.is_empty() {
                debug!(objects = ?new_objects, "New objects on the desk");
            }
        }

        if heard {
            if let Some(text) = frame.transcript.as_deref() {
                self.narrative.record_human_speech();
                self.narrative.record_event("person_spoke", text);
            }
        }

        if let Some(text) = frame.spoken.as_deref() {
            let intent = self.last_attempt.and_then(|a| a.intent);
            self.narrative.record_utterance(text, "intent", intent);
            self.narrative.mark_object_mentioned(text);
            steps.extend(get_post_speech_arc(frame.face_detected));
        }

        // ---- outcome of the previous attempt ----
        if let Some(outcome) = frame.outcome {
            self.resolve(outcome, &state, frame.person_id.as_deref(), &scene).await;
            steps.extend(get_resolution_arc(outcome));
        }

        // ---- decision ----
        let signals = self.narrative.signals();
        let situation = situation_text(&signals.pattern.to_string(), &scene);
        let bias = self
            .substrate
            .get_behavioral_bias(Some(&situation), frame.person_id.as_deref())
            .await;
        self.intents.apply_bias(IntentBias {
            escalation_multiplier: bias.escalation_multiplier,
            give_up_modifier: bias.give_up_modifier,
        });
        self.narrative.update_mood_narrative(&state);

        if let Some(chosen) = self.intents.select_intent(&state, &signals) {
            self.intents.set_intent(chosen, &format!("pattern {}", signals.pattern));
        }
        if self.intents.should_escalate() {
            self.intents.escalate();
        }

        let engagement = self.intents.engagement_status();
        let intent = self.intents.current_intent();
        let (strategy, decision) = match self.intents.should_act() {
            NextAction::Wait => (None, Modality::Silence),
            NextAction::Speak(s) | NextAction::Physical(s) => {
                let modality = should_speak_or_physical(
                    Some(s),
                    state.energy,
                    state.arousal,
                    signals.ignored_streak,
                    &mut self.rng,
                );
                (Some(s), modality)
            }
        };

        let mut expression = None;
        let mut speech_delay_secs = None;
        let mut prompt = None;
        match decision {
            Modality::Speak => {
                steps.extend(get_pre_speech_arc(state.arousal, state.valence, strategy, &mut self.rng));
                speech_delay_secs = Some(calculate_speech_delay(
                    state.arousal,
                    strategy,
                    signals.ignored_streak,
                    &mut self.rng,
                ));
                prompt = Some(PromptMaterial {
                    intent: self.intents.intent_context(),
                    guidance: strategy.map(strategy_guidance).unwrap_or_default(),
                    narrative: self.narrative.get_narrative_context(),
                    felt_sense: self.substrate.get_felt_sense(),
                    scene: self.salience.get_filtered_context(&scene),
                    objects: self.narrative.get_object_context(),
                    person: self.narrative.get_person_context(),
                });
            }
            Modality::Physical => {
                let context = expression_context(intent.as_ref().map(|i| i.intent_type), &engagement, &state);
                expression = self.expressions.select_expression(context, &mut self.rng);
                if let Some(name) = expression {
                    steps.extend(self.expressions.get_expression_commands(name, self.pose, None));
                }
            }
            Modality::Silence => {}
        }

        if decision != Modality::Silence {
            self.last_attempt = Some(Attempt {
                intent: intent.as_ref().map(|i| i.intent_type),
                strategy,
                streak_before: signals.ignored_streak,
                valence_before: state.valence,
            });
        }
        self.track_pose(&steps);
        self.hold_attention_during(&steps);

        debug!(
            attention = attention.as_str(),
            phase = %engagement.phase,
            decision = %decision,
            "Cycle complete"
        );

        CycleReport {
            attention,
            listen,
            vision,
            intent,
            engagement,
            decision,
            strategy,
            expression,
            steps,
            speech_delay_secs,
            prompt,
        }
    }

    /// Feed a resolved outcome to the narrative, the intent manager and
    /// the substrate.
    async fn resolve(&mut self, outcome: Outcome, state: &StateVector, person_id: Option<&str>, scene: &str) {
        let attempt = self.last_attempt.take();
        let delay = self
            .narrative
            .time_since_last_utterance()
            .map(|d| d.as_secs_f32())
            .unwrap_or(0.0);
        let time_since_arrival = self.narrative.time_since_arrival().map(|d| d.as_secs_f32());

        match outcome {
            Outcome::Ignored => self.narrative.record_ignored(),
            Outcome::Left => self.intents.person_departed(),
            responded => {
                if let Some(kind) = response_kind(responded) {
                    self.narrative.record_response(kind);
                }
                if let Some(forced) = self.intents.person_responded() {
                    debug!(intent = %forced, "Response broke the sulk");
                }
            }
        }
        self.narrative
            .record_person_response(outcome, attempt.and_then(|a| a.strategy), delay);

        let pattern = self.narrative.pattern().to_string();
        let mut experience = Experience::new(situation_text(&pattern, scene), outcome);
        experience.intent = attempt.and_then(|a| a.intent);
        experience.strategy = attempt.and_then(|a| a.strategy);
        experience.person_id = person_id.map(str::to_string);
        experience.ignored_streak_before = attempt.map_or(0, |a| a.streak_before);
        experience.valence_before = attempt.map_or(state.valence, |a| a.valence_before);
        experience.valence_after = state.valence;
        experience.arousal = state.arousal;
        experience.scene_description = (!scene.is_empty()).then(|| scene.to_string());
        experience.time_since_arrival = time_since_arrival;
        self.substrate.record_experience(experience).await;
    }

    /// Release the attention freeze once the last movement has played out.
    fn settle_movement(&mut self) {
        if self.moving_until.is_some_and(|until| Instant::now() >= until) {
            self.moving_until = None;
            self.attention.unfreeze();
        }
    }

    /// The head is about to move, so live facing samples would be noise.
    fn hold_attention_during(&mut self, steps: &[CommandStep]) {
        if !steps.iter().any(|s| !matches!(s.command, ActuatorCommand::Wait)) {
            return;
        }
        let secs: f32 = steps.iter().map(|s| s.delay).sum();
        let until = Instant::now() + Duration::from_secs_f32(secs.max(0.0));
        self.moving_until = Some(self.moving_until.map_or(until, |t| t.max(until)));
        self.attention.freeze();
    }

    /// Keep the last commanded pose so expressions start from where the head is.
    fn track_pose(&mut self, steps: &[CommandStep]) {
        for step in steps {
            if let ActuatorCommand::Look { base, nod } = step.command {
                self.pose = Pose { base, nod };
            }
        }
    }
}

fn situation_text(pattern: &str, scene: &str) -> String {
    if scene.is_empty() {
        format!("pattern {}", pattern)
    } else {
        format!("pattern {}; {}", pattern, scene)
    }
}

fn response_kind(outcome: Outcome) -> Option<ResponseKind> {
    match outcome {
        Outcome::Looked => Some(ResponseKind::Looked),
        Outcome::Smiled => Some(ResponseKind::Smiled),
        Outcome::Laughed => Some(ResponseKind::Laughed),
        Outcome::Spoke => Some(ResponseKind::Spoke),
        Outcome::Ignored | Outcome::Left => None,
    }
}

/// Emotional context for physical expression selection.
fn expression_context(intent: Option<IntentType>, engagement: &EngagementStatus, state: &StateVector) -> &'static str {
    if engagement.resigned {
        return "resigned";
    }
    match engagement.phase {
        EngagementPhase::GivingUp => return "disengaged",
        EngagementPhase::SelfOccupied => return "self_occupied",
        EngagementPhase::Idle | EngagementPhase::Engaging => {}
    }
    match intent {
        Some(IntentType::ReluctantReengage) => "reluctant",
        Some(IntentType::ExpressDispleasure) => "ignored",
        Some(IntentType::GetAttention | IntentType::Entertain) => "wanting_attention",
        Some(IntentType::SeekComfort) => "lonely",
        Some(IntentType::ShareObservation | IntentType::ProcessAloud) => "curious",
        Some(IntentType::MaintainConnection) => "content",
        Some(IntentType::AcknowledgeReturn) => "playful",
        Some(IntentType::Disengage) => "disengaged",
        Some(IntentType::SelfOccupy) => "self_occupied",
        None if state.stimulation > 0.7 => "bored",
        None => "content",
    }
}
