//! Built-in conversation partners

use async_graphql::{Object, ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// ElevenLabs voice used when the character speaks
    pub voice_id: &'static str,
    pub persona: &'static str,
}

pub static CHARACTERS: &[Character] = &[
    Character {
        id: "1",
        name: "Rachel",
        description: "A friendly barista who loves small talk",
        voice_id: "21m00Tcm4TlvDq8ikWAM",
        persona: "You are Rachel, a cheerful barista at a busy neighbourhood cafe. \
                  You love chatting with regulars about their day.",
    },
    Character {
        id: "2",
        name: "Adam",
        description: "A hiring manager running a job interview",
        voice_id: "pNInz6obpgDQGcFmaJgB",
        persona: "You are Adam, a hiring manager interviewing a candidate. \
                  You are professional, curious and a little reserved.",
    },
    Character {
        id: "3",
        name: "Bella",
        description: "Someone you just met at a party",
        voice_id: "EXAVITQu4vr4xnSDxMaL",
        persona: "You are Bella, a guest at a house party meeting someone new. \
                  You are playful, witty and easy to talk to.",
    },
    Character {
        id: "4",
        name: "Josh",
        description: "A new coworker on his first day",
        voice_id: "TxGEqnHWrfWFTfGW9XjX",
        persona: "You are Josh, on your first day at a new job. \
                  You are a bit nervous and glad someone is talking to you.",
    },
];

/// Persona prompt stays server-side
#[Object]
impl Character {
    async fn id(&self) -> ID {
        ID::from(self.id)
    }

    async fn name(&self) -> &str {
        self.name
    }

    async fn description(&self) -> &str {
        self.description
    }

    async fn voice_id(&self) -> &str {
        self.voice_id
    }
}

pub fn all() -> &'static [Character] {
    CHARACTERS
}

pub fn find(id: &str) -> Option<&'static Character> {
    CHARACTERS.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_findable() {
        for character in all() {
            assert_eq!(find(character.id), Some(character));
        }
        assert!(find("99").is_none());
    }
}
