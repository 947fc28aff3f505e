use super::{Evaluator, EvaluatorRegistry, Example, ExampleMessage};
use crate::memory::Content;

/// Returns the built-in registry: `summarization`, `fact` and `goal`.
pub fn default_registry() -> EvaluatorRegistry {
    EvaluatorRegistry {
        evaluators: vec![summarization(), fact(), goal()],
    }
}

fn message(user: &str, text: &str) -> ExampleMessage {
    ExampleMessage::new(user, text)
}

fn summarization() -> Evaluator {
    Evaluator {
        name: "summarization".to_string(),
        description: "Summarize the conversation so far into a short recap the agent can recall later."
            .to_string(),
        similes: vec!["SUMMARIZE".to_string(), "RECAP".to_string()],
        condition: "The conversation has grown long or has reached a natural pause, and no recent summary exists."
            .to_string(),
        examples: vec![Example {
            context: "{{user1}} and {{user2}} have been planning a trip for a while.".to_string(),
            messages: vec![
                message("{{user1}}", "So we fly out on the 12th and take the train to Porto."),
                message("{{user2}}", "Right, and {{user1}} books the hotel, I handle the tickets."),
                ExampleMessage::new(
                    "{{user1}}",
                    Content::text("Can you remind us where we landed on all this?").with_action("SUMMARIZE"),
                ),
            ],
            outcome: "{{user1}} and {{user2}} fly out on the 12th and take the train to Porto. {{user1}} books the hotel; {{user2}} buys the tickets."
                .to_string(),
        }],
    }
}

fn fact() -> Evaluator {
    Evaluator {
        name: "fact".to_string(),
        description: "Extract durable facts about the participants and store them as memories.".to_string(),
        similes: vec!["GET_FACTS".to_string(), "EXTRACT_FACTS".to_string()],
        condition: "A participant stated something about themselves or the world that is worth remembering."
            .to_string(),
        examples: vec![
            Example {
                context: "{{user1}} is getting to know {{user2}}.".to_string(),
                messages: vec![
                    message("{{user1}}", "Where are you based these days?"),
                    message("{{user2}}", "I moved to Lisbon last spring. I work as a nurse there."),
                ],
                outcome: "[{ \"claim\": \"{{user2}} lives in Lisbon\", \"type\": \"fact\" }, { \"claim\": \"{{user2}} works as a nurse\", \"type\": \"fact\" }]"
                    .to_string(),
            },
            Example {
                context: "{{user1}} and {{user3}} chat about weekend plans.".to_string(),
                messages: vec![
                    message("{{user3}}", "Any plans for Saturday?"),
                    message("{{user1}}", "Not really, maybe a walk."),
                ],
                outcome: "[]".to_string(),
            },
        ],
    }
}

fn goal() -> Evaluator {
    Evaluator {
        name: "goal".to_string(),
        description: "Track progress on the goals the agent has been given and update their status."
            .to_string(),
        similes: vec!["UPDATE_GOALS".to_string()],
        condition: "The conversation mentions progress on, completion of, or abandonment of a known goal."
            .to_string(),
        examples: vec![Example {
            context: "{{user1}} asked the agent to help them run a 10k by June.".to_string(),
            messages: vec![
                message("{{user1}}", "I ran 8k without stopping this morning!"),
                ExampleMessage::new(
                    "{{user2}}",
                    Content::text("That is great progress, {{user1}}.").with_action("CONTINUE"),
                ),
            ],
            outcome: "[{ \"goal\": \"Run a 10k by June\", \"status\": \"IN_PROGRESS\", \"progress\": \"8k completed\" }]"
                .to_string(),
        }],
    }
}
