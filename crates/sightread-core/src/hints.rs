use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sightread_domain_coach::{
    coach_prompt, fallback_pool, pattern_tip, Confusion, Hint, HintContext, HintKind,
    MistakeTracker, NoteErrorCount,
};
use sightread_domain_note::NoteName;
use sightread_ports::clock::Clock;
use sightread_ports::coach::{CoachPort, CoachRequest};
use sightread_ports::storage::SettingsDto;
use sightread_ports::types::{Clef, Lang, Millis};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct HintsConfig {
    pub enabled: bool,
    pub rate_limit_ms: Millis,
    pub display_ms: Millis,
    pub streak_milestone: u32,
    pub mistake_threshold: u32,
    pub lang: Lang,
    pub clef: Clef,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self::from_settings(&SettingsDto::default())
    }
}

impl HintsConfig {
    pub fn from_settings(settings: &SettingsDto) -> Self {
        Self {
            enabled: settings.hints_enabled,
            rate_limit_ms: settings.hint_rate_limit_ms,
            display_ms: settings.hint_display_ms,
            streak_milestone: settings.streak_milestone.max(1),
            mistake_threshold: settings.mistake_threshold.max(1),
            lang: settings.lang,
            clef: settings.clef,
        }
    }
}

/// What went wrong on a judged note. Either name may be unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MistakeInfo {
    pub expected: Option<NoteName>,
    pub played: Option<NoteName>,
}

impl MistakeInfo {
    pub fn new(expected: NoteName, played: NoteName) -> Self {
        Self {
            expected: Some(expected),
            played: Some(played),
        }
    }
}

enum HintRequest {
    Ready(String, HintKind),
    Remote(HintContext, HintKind),
}

struct HintsState {
    previous_streak: u32,
    consecutive_mistakes: u32,
    last_hint_at: Option<Millis>,
    next_id: u64,
    current: Option<Hint>,
    dismiss_at: Option<Millis>,
    tracker: MistakeTracker,
    rng: StdRng,
}

impl HintsState {
    fn expire(&mut self, now: Millis) {
        if matches!(self.dismiss_at, Some(at) if now >= at) {
            self.current = None;
            self.dismiss_at = None;
        }
    }
}

/// Decides when a coaching hint is shown and what it says.
pub struct AdaptiveHints {
    coach: Arc<dyn CoachPort>,
    clock: Arc<dyn Clock>,
    config: HintsConfig,
    state: Mutex<HintsState>,
}

impl AdaptiveHints {
    pub fn new(coach: Arc<dyn CoachPort>, clock: Arc<dyn Clock>, config: HintsConfig) -> Self {
        Self::with_rng(coach, clock, config, StdRng::from_entropy())
    }

    pub fn with_rng(
        coach: Arc<dyn CoachPort>,
        clock: Arc<dyn Clock>,
        config: HintsConfig,
        rng: StdRng,
    ) -> Self {
        let tracker = MistakeTracker::with_clock(Arc::clone(&clock));
        Self {
            coach,
            clock,
            config,
            state: Mutex::new(HintsState {
                previous_streak: 0,
                consecutive_mistakes: 0,
                last_hint_at: None,
                next_id: 1,
                current: None,
                dismiss_at: None,
                tracker,
                rng,
            }),
        }
    }

    pub fn config(&self) -> &HintsConfig {
        &self.config
    }

    /// Feed one judged note.
    ///
    /// A streak drop counts toward the mistake threshold on top of an explicit
    /// mistake, so a wrong note that breaks a streak counts twice.
    pub fn on_practice_update(&self, streak: u32, mistake: Option<MistakeInfo>) {
        if !self.config.enabled {
            return;
        }

        let mut requests = Vec::new();
        {
            let mut state = self.state.lock();

            if let Some(info) = mistake {
                if let (Some(expected), Some(played)) = (info.expected, info.played) {
                    state.tracker.add_mistake(expected, played);
                }
                state.consecutive_mistakes += 1;
                if state.consecutive_mistakes >= self.config.mistake_threshold {
                    state.consecutive_mistakes = 0;
                    let request = match state.tracker.detect_patterns() {
                        Some(pattern) => {
                            log::debug!("hints: detected {pattern:?}");
                            HintRequest::Ready(pattern_tip(self.config.lang, &pattern), HintKind::Tip)
                        }
                        None => HintRequest::Remote(HintContext::Struggling, HintKind::Tip),
                    };
                    requests.push(request);
                }
            }

            if streak > state.previous_streak
                && streak > 0
                && streak % self.config.streak_milestone == 0
            {
                state.consecutive_mistakes = 0;
                requests.push(HintRequest::Remote(
                    HintContext::Streak(streak),
                    HintKind::Encouragement,
                ));
            }

            if streak < state.previous_streak {
                state.consecutive_mistakes += 1;
            }

            state.previous_streak = streak;
        }

        for request in requests {
            match request {
                HintRequest::Ready(text, kind) => self.show_hint(text, kind),
                HintRequest::Remote(context, kind) => self.remote_hint(context, kind),
            }
        }
    }

    /// Hint currently on screen; an expired hint is cleared on the way.
    pub fn current_hint(&self) -> Option<Hint> {
        let mut state = self.state.lock();
        state.expire(self.clock.now_ms());
        state.current.clone()
    }

    /// Apply the auto-dismiss deadline. Hosts with a tick loop call this each frame.
    pub fn poll(&self) {
        self.state.lock().expire(self.clock.now_ms());
    }

    pub fn dismiss_hint(&self) {
        let mut state = self.state.lock();
        if let Some(hint) = state.current.take() {
            log::debug!("hints: dismissed hint {}", hint.id);
        }
        state.dismiss_at = None;
    }

    /// Session end: cancel the pending auto-dismiss.
    pub fn shutdown(&self) {
        self.state.lock().dismiss_at = None;
    }

    pub fn top_confusions(&self, limit: usize) -> Vec<Confusion> {
        self.state.lock().tracker.top_confusions(limit)
    }

    pub fn difficult_notes(&self, limit: usize) -> Vec<NoteErrorCount> {
        self.state.lock().tracker.difficult_notes(limit)
    }

    fn remote_hint(&self, context: HintContext, kind: HintKind) {
        if self.rate_limited(self.clock.now_ms()) {
            log::debug!("hints: rate limited, skipping coach call for {kind:?} hint");
            return;
        }
        let request = CoachRequest {
            message: coach_prompt(context, kind),
            clef: self.config.clef,
            lang: self.config.lang,
        };
        let text = match self.coach.ask_coach(&request) {
            Ok(reply) if !reply.reply_text.trim().is_empty() => reply.reply_text.trim().to_string(),
            Ok(_) => {
                log::warn!("hints: coach returned an empty reply, using local hint");
                self.local_hint(kind)
            }
            Err(err) => {
                log::warn!("hints: coach call failed ({err}), using local hint");
                self.local_hint(kind)
            }
        };
        self.show_hint(text, kind);
    }

    fn rate_limited(&self, now: Millis) -> bool {
        let last = self.state.lock().last_hint_at;
        within_rate_limit(last, now, self.config.rate_limit_ms)
    }

    fn local_hint(&self, kind: HintKind) -> String {
        let pool = fallback_pool(self.config.lang, kind);
        let mut state = self.state.lock();
        pool.choose(&mut state.rng)
            .copied()
            .unwrap_or_default()
            .to_string()
    }

    fn show_hint(&self, text: String, kind: HintKind) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        if within_rate_limit(state.last_hint_at, now, self.config.rate_limit_ms) {
            log::debug!("hints: rate limited, dropping {kind:?} hint");
            return;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.last_hint_at = Some(now);
        state.current = Some(Hint { id, text, kind });
        state.dismiss_at = Some(now.saturating_add(self.config.display_ms));
        log::info!("hints: showing {kind:?} hint {id}");
    }
}

fn within_rate_limit(last_hint_at: Option<Millis>, now: Millis, rate_limit_ms: Millis) -> bool {
    matches!(last_hint_at, Some(last) if now.saturating_sub(last) < rate_limit_ms)
}
