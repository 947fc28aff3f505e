//! Example instantiation with generated participant names.

use super::{Evaluator, Example};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::sync::{Arc, Mutex, PoisonError};

/// Number of `{{userN}}` placeholders bound per example.
pub const PLACEHOLDER_COUNT: usize = 5;

/// Source of participant display names. Names need not be unique.
pub trait NameGenerator: Send + Sync + std::fmt::Debug {
    fn next_name(&self) -> String;
}

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bashir", "Chen", "Dana", "Elif", "Farah", "Gustavo", "Hana", "Ivan", "Jun",
    "Kofi", "Lena", "Mateo", "Nadia", "Oskar", "Priya", "Quinn", "Rosa", "Sami", "Tomas",
    "Uma", "Viktor", "Wen", "Ximena", "Yusuf", "Zara",
];

/// Samples names uniformly from a built-in list of first names.
#[derive(Debug)]
pub struct RandomNameGenerator {
    rng: Mutex<StdRng>,
}

impl Default for RandomNameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomNameGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl NameGenerator for RandomNameGenerator {
    fn next_name(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        FIRST_NAMES
            .choose(&mut *rng)
            .copied()
            .unwrap_or("Alex")
            .to_string()
    }
}

/// An example with placeholders replaced by concrete names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedExample {
    pub context: String,
    /// `Name: text` lines, with ` (ACTION)` appended when the message has an action.
    pub messages: Vec<String>,
    pub outcome: String,
}

impl std::fmt::Display for RenderedExample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Context:\n{}\n\nMessages:\n{}\n\nOutcome:\n{}",
            self.context,
            self.messages.join("\n"),
            self.outcome
        )
    }
}

/// Replaces `{{user1}}`..`{{user5}}` with freshly sampled names.
///
/// Each call to [`render`](Self::render) samples a new binding, so names are
/// consistent within one example but independent across examples.
#[derive(Debug, Clone)]
pub struct ExampleRenderer {
    names: Arc<dyn NameGenerator>,
}

impl Default for ExampleRenderer {
    fn default() -> Self {
        Self::new(Arc::new(RandomNameGenerator::new()))
    }
}

impl ExampleRenderer {
    pub fn new(names: Arc<dyn NameGenerator>) -> Self {
        Self { names }
    }

    pub fn render(&self, example: &Example) -> RenderedExample {
        let names: Vec<String> = (0..PLACEHOLDER_COUNT).map(|_| self.names.next_name()).collect();

        let messages = example
            .messages
            .iter()
            .map(|message| {
                let mut line = format!("{}: {}", message.user, message.content.text);
                if let Some(action) = message.content.action.as_deref().filter(|a| !a.is_empty()) {
                    line.push_str(&format!(" ({action})"));
                }
                substitute(&line, &names)
            })
            .collect();

        RenderedExample {
            context: substitute(&example.context, &names),
            messages,
            outcome: substitute(&example.outcome, &names),
        }
    }

    /// Render every example of every evaluator, each with its own names.
    pub fn render_all<'a, I>(&self, evaluators: I) -> Vec<RenderedExample>
    where
        I: IntoIterator<Item = &'a Evaluator>,
    {
        evaluators
            .into_iter()
            .flat_map(|e| e.examples.iter())
            .map(|example| self.render(example))
            .collect()
    }
}

/// Replace every `{{userN}}` with the N-th name. Names are inserted verbatim.
fn substitute(template: &str, names: &[String]) -> String {
    fill_placeholders(template, |key| {
        (1..=names.len())
            .find(|i| key == format!("user{i}"))
            .map(|i| names[i - 1].as_str())
    })
}

/// Replace each `{{key}}` in `template` with `value(key)` in a single pass.
///
/// Inserted values are never scanned again, so a value that itself contains
/// `{{...}}` comes out verbatim. Keys without a value are left in place.
pub(crate) fn fill_placeholders<'v>(
    template: &str,
    value: impl Fn(&str) -> Option<&'v str>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}").and_then(|end| Some((end, value(&after[..end])?))) {
            Some((end, replacement)) => {
                out.push_str(replacement);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::ExampleMessage;
    use crate::memory::Content;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Yields `N0`, `N1`, ... so bindings are observable.
    #[derive(Debug, Default)]
    struct SequentialNames(AtomicUsize);

    impl NameGenerator for SequentialNames {
        fn next_name(&self) -> String {
            format!("N{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[derive(Debug)]
    struct ConstantName;

    impl NameGenerator for ConstantName {
        fn next_name(&self) -> String {
            "Sam".to_string()
        }
    }

    fn example() -> Example {
        Example {
            context: "{{user1}} and {{user2}} talk; {{user1}} leads.".to_string(),
            messages: vec![
                ExampleMessage::new("{{user1}}", "Hi {{user2}}, meet {{user3}}."),
                ExampleMessage::new(
                    "{{user2}}",
                    Content::text("Hello {{user1}}!").with_action("CONTINUE"),
                ),
            ],
            outcome: "{{user3}} was introduced by {{user1}}".to_string(),
        }
    }

    #[test]
    fn test_render_binds_names_consistently() {
        let renderer = ExampleRenderer::new(Arc::new(SequentialNames::default()));
        let rendered = renderer.render(&example());

        assert_eq!(rendered.context, "N0 and N1 talk; N0 leads.");
        assert_eq!(
            rendered.messages,
            vec!["N0: Hi N1, meet N2.", "N1: Hello N0! (CONTINUE)"]
        );
        assert_eq!(rendered.outcome, "N2 was introduced by N0");
    }

    #[test]
    fn test_render_samples_five_names_per_example() {
        let names = Arc::new(SequentialNames::default());
        let renderer = ExampleRenderer::new(Arc::clone(&names) as Arc<dyn NameGenerator>);

        let first = renderer.render(&example());
        let second = renderer.render(&example());

        assert_eq!(names.0.load(Ordering::SeqCst), 2 * PLACEHOLDER_COUNT);
        assert_eq!(first.outcome, "N2 was introduced by N0");
        assert_eq!(second.outcome, "N7 was introduced by N5");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let renderer = ExampleRenderer::new(Arc::new(SequentialNames::default()));
        let rendered = renderer.render(&Example {
            context: "{{user6}} is not bound, {{agentName}} neither".to_string(),
            messages: vec![],
            outcome: String::new(),
        });
        assert_eq!(rendered.context, "{{user6}} is not bound, {{agentName}} neither");
        assert!(rendered.messages.is_empty());
    }

    #[test]
    fn test_render_tolerates_name_collisions() {
        let renderer = ExampleRenderer::new(Arc::new(ConstantName));
        let rendered = renderer.render(&example());
        assert_eq!(rendered.outcome, "Sam was introduced by Sam");
    }

    /// Hands out names that look like placeholders.
    #[derive(Debug)]
    struct PlaceholderNames(AtomicUsize);

    impl NameGenerator for PlaceholderNames {
        fn next_name(&self) -> String {
            match self.0.fetch_add(1, Ordering::SeqCst) {
                0 => "{{user2}}".to_string(),
                1 => "Bob".to_string(),
                n => format!("N{n}"),
            }
        }
    }

    #[test]
    fn test_render_does_not_rescan_inserted_names() {
        let renderer = ExampleRenderer::new(Arc::new(PlaceholderNames(AtomicUsize::new(0))));
        let rendered = renderer.render(&Example {
            context: "{{user1}} meets {{user2}}".to_string(),
            messages: vec![ExampleMessage::new("{{user1}}", "hi")],
            outcome: "{{user1}}".to_string(),
        });

        assert_eq!(rendered.context, "{{user2}} meets Bob");
        assert_eq!(rendered.messages, vec!["{{user2}}: hi"]);
        assert_eq!(rendered.outcome, "{{user2}}");
    }

    #[test]
    fn test_fill_placeholders() {
        let value = |key: &str| match key {
            "a" => Some("{{b}}"),
            "b" => Some("B"),
            _ => None,
        };
        assert_eq!(fill_placeholders("{{a}}-{{b}}-{{c}}", value), "{{b}}-B-{{c}}");
        assert_eq!(fill_placeholders("{{ {{b}} }}", value), "{{ B }}");
        assert_eq!(fill_placeholders("open {{b", value), "open {{b");
        assert_eq!(fill_placeholders("", value), "");
    }

    #[test]
    fn test_display_layout() {
        let rendered = RenderedExample {
            context: "ctx".to_string(),
            messages: vec!["A: hi".to_string(), "B: yo".to_string()],
            outcome: "out".to_string(),
        };
        assert_eq!(
            rendered.to_string(),
            "Context:\nctx\n\nMessages:\nA: hi\nB: yo\n\nOutcome:\nout"
        );
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let a = RandomNameGenerator::seeded(7);
        let b = RandomNameGenerator::seeded(7);
        let from_a: Vec<_> = (0..10).map(|_| a.next_name()).collect();
        let from_b: Vec<_> = (0..10).map(|_| b.next_name()).collect();
        assert_eq!(from_a, from_b);
        assert!(from_a.iter().all(|n| FIRST_NAMES.contains(&n.as_str())));
    }
}
