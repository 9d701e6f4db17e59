//! Localized hint strings and prompts for the remote coach.

use crate::hint::HintKind;
use crate::mistakes::Pattern;
use sightread_ports::types::Lang;

/// What the remote coach is asked to react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintContext {
    Struggling,
    Streak(u32),
}

const ENCOURAGEMENT_EN: &[&str] = &[
    "Great job! Keep it up!",
    "You're on a roll!",
    "Excellent reading, your eyes are getting faster.",
    "Nice streak! Stay relaxed and keep going.",
    "That's the way, steady and accurate.",
];

const TIP_EN: &[&str] = &[
    "Take your time and read each note carefully.",
    "Find the nearest landmark note, then count lines and spaces.",
    "Say the note name out loud before you play it.",
    "Slow down a little: accuracy first, speed later.",
    "Check the clef before reading the first note.",
];

const ENCOURAGEMENT_ES: &[&str] = &[
    "¡Buen trabajo! ¡Sigue así!",
    "¡Vas muy bien!",
    "Excelente lectura, tus ojos son cada vez más rápidos.",
    "¡Buena racha! Mantén la calma y continúa.",
    "Así se hace, constante y preciso.",
];

const TIP_ES: &[&str] = &[
    "Tómate tu tiempo y lee cada nota con cuidado.",
    "Busca la nota de referencia más cercana y cuenta líneas y espacios.",
    "Di el nombre de la nota en voz alta antes de tocarla.",
    "Ve un poco más despacio: primero precisión, luego velocidad.",
    "Revisa la clave antes de leer la primera nota.",
];

/// Local fallback pool for `kind`; never empty.
pub fn fallback_pool(lang: Lang, kind: HintKind) -> &'static [&'static str] {
    match (lang, kind) {
        (Lang::En, HintKind::Encouragement) => ENCOURAGEMENT_EN,
        (Lang::En, HintKind::Tip) => TIP_EN,
        (Lang::Es, HintKind::Encouragement) => ENCOURAGEMENT_ES,
        (Lang::Es, HintKind::Tip) => TIP_ES,
    }
}

/// Deterministic tip for a detected mistake pattern.
pub fn pattern_tip(lang: Lang, pattern: &Pattern) -> String {
    match (lang, pattern) {
        (Lang::En, Pattern::Accidentals { .. }) => {
            "Watch the sharps and flats: check the key signature and any accidentals before playing."
                .to_string()
        }
        (Lang::En, Pattern::Adjacent { .. }) => {
            "You're landing one step off. Check whether the note sits on a line or in a space."
                .to_string()
        }
        (Lang::En, Pattern::NotePair { note_a, note_b, .. }) => format!(
            "You keep mixing up {} and {}. Compare where each one sits on the staff.",
            note_a, note_b
        ),
        (Lang::Es, Pattern::Accidentals { .. }) => {
            "Atención a los sostenidos y bemoles: revisa la armadura y las alteraciones antes de tocar."
                .to_string()
        }
        (Lang::Es, Pattern::Adjacent { .. }) => {
            "Estás tocando una nota vecina. Fíjate si la nota está en una línea o en un espacio."
                .to_string()
        }
        (Lang::Es, Pattern::NotePair { note_a, note_b, .. }) => format!(
            "Confundes {} y {} a menudo. Compara dónde está cada una en el pentagrama.",
            note_a, note_b
        ),
    }
}

/// Short prompt sent to the remote coach. The reply language travels separately.
pub fn coach_prompt(context: HintContext, kind: HintKind) -> String {
    let situation = match context {
        HintContext::Struggling => "is struggling with several wrong notes in a row".to_string(),
        HintContext::Streak(n) => format!("has a {}-note streak", n),
    };
    let tone = match kind {
        HintKind::Encouragement => "encouraging",
        HintKind::Tip => "helpful, practical",
    };
    format!(
        "A student practicing sight-reading {}. Reply with one short, {} sentence.",
        situation, tone
    )
}
