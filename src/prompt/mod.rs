//! Multi-step prompt completion.
//!
//! A key-definition body may embed `&` markers. The prescan turns each
//! marker into a prompt command and rewrites the body into a template
//! with the markers left as placeholders. Executing such a chain pushes
//! a [`PromptStack`] entry; the host feeds responses in with
//! [`complete`](PromptStack::complete) as the user supplies them, and
//! once every prompt of the entry is answered,
//! [`process`](PromptStack::process) substitutes the responses into the
//! template, re-parses the resulting line and hands back the commands
//! together with the entry's deferred tail and saved cursor mark.
//!
//! Entries form a LIFO stack; only the top entry solicits input. The
//! engine never blocks: between `complete` calls nothing runs and
//! nothing is held beyond the entries themselves.

use crate::cmd::{Cmd, Op, PromptArgs, Quote};
use crate::error::PromptError;
use crate::parse::Parser;

// =============================================================================
// PRESCAN
// =============================================================================

/// Scan a definition body for unescaped `&` prompt markers.
///
/// Returns the prompt run, one command per marker in text order, or
/// `None` when the body has no marker and should be parsed as plain
/// statements. Each marker may be followed directly by a quoted prompt
/// string (`'…'` trims leading blanks from the response, backquotes
/// keep them); the prompt string is removed from the rewritten text
/// while the marker itself stays as the substitution placeholder. An
/// escaped marker rewrites to a literal `&`.
pub fn prescan(text: &str, escape: char, transient: bool) -> Option<Vec<Cmd>> {
    let mut rewritten = String::with_capacity(text.len());
    let mut found: Vec<(usize, String, Quote)> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == escape {
            match chars.next() {
                Some('&') => rewritten.push('&'),
                Some(other) => {
                    rewritten.push(c);
                    rewritten.push(other);
                }
                None => rewritten.push(c),
            }
        } else if c == '&' {
            let at = rewritten.len();
            rewritten.push('&');
            let (prompt, quote) = match chars.peek() {
                Some(&q) if q == '\'' || q == '`' => {
                    chars.next();
                    let mut prompt = String::new();
                    // A missing closer swallows the rest of the body.
                    for p in chars.by_ref() {
                        if p == q {
                            break;
                        }
                        prompt.push(p);
                    }
                    let quote = if q == '`' { Quote::Keep } else { Quote::Trim };
                    (prompt, quote)
                }
                _ => (String::new(), Quote::Trim),
            };
            found.push((at, prompt, quote));
        } else {
            rewritten.push(c);
        }
    }

    if found.is_empty() {
        return None;
    }
    let last = found.len() - 1;
    let run = found
        .into_iter()
        .enumerate()
        .map(|(i, (insert_at, prompt, quote))| {
            let args = PromptArgs {
                prompt,
                insert_at,
                mult: i > 0,
                quote,
                template: (i == last).then(|| rewritten.clone()),
            };
            if transient {
                Cmd::transient(Op::Prompt(args))
            } else {
                Cmd::new(Op::Prompt(args))
            }
        })
        .collect();
    Some(run)
}

// =============================================================================
// PROMPT STACK
// =============================================================================

/// Outcome of storing one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The entry still needs responses; show this prompt next.
    Pending { prompt: String },
    /// The top entry is fully answered and may be processed. `below` is
    /// the prompt of the entry that solicits next, `None` when the
    /// prompt display should clear.
    Ready { below: Option<String> },
}

/// A fully answered chain turned back into executable commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<M> {
    pub commands: Vec<Cmd>,
    /// Cursor mark saved when the chain was issued.
    pub mark: M,
}

#[derive(Debug)]
struct Entry<M> {
    run: Vec<PromptArgs>,
    responses: Vec<Option<String>>,
    mark: M,
    defer: Vec<Cmd>,
}

impl<M> Entry<M> {
    /// Prompt text of the first unanswered slot.
    fn next_prompt(&self) -> Option<&str> {
        let slot = self.responses.iter().position(Option::is_none)?;
        Some(&self.run[slot].prompt)
    }

    fn answered(&self) -> bool {
        self.responses.iter().all(Option::is_some)
    }
}

/// LIFO stack of prompt chains awaiting responses.
///
/// `M` is the host's cursor mark, saved at issue time and surfaced when
/// the chain resolves. One stack per editor session.
#[derive(Debug)]
pub struct PromptStack<M> {
    entries: Vec<Entry<M>>,
}

impl<M> Default for PromptStack<M> {
    fn default() -> Self {
        PromptStack {
            entries: Vec::new(),
        }
    }
}

impl<M> PromptStack<M> {
    pub fn new() -> Self {
        PromptStack::default()
    }

    /// Push a chain that begins with one or more prompt commands.
    ///
    /// The leading run of consecutive prompts becomes the new top
    /// entry; everything after the run is deferred until the entry
    /// resolves. Returns the first prompt text for display.
    pub fn issue(&mut self, chain: Vec<Cmd>, mark: M) -> Result<String, PromptError> {
        let mut run: Vec<PromptArgs> = Vec::new();
        let mut defer: Vec<Cmd> = Vec::new();
        for cmd in chain {
            match cmd.op {
                Op::Prompt(args) if defer.is_empty() => run.push(args),
                op => defer.push(Cmd {
                    op,
                    transient: cmd.transient,
                }),
            }
        }
        if run.is_empty() {
            return Err(PromptError::NotAPrompt);
        }
        let first = run[0].prompt.clone();
        let responses = vec![None; run.len()];
        log::debug!(
            "prompt entry issued: {} prompts, {} deferred",
            run.len(),
            defer.len()
        );
        self.entries.push(Entry {
            run,
            responses,
            mark,
            defer,
        });
        Ok(first)
    }

    /// Store one response in the top entry's first unanswered slot.
    pub fn complete(&mut self, text: &str) -> Result<Completion, PromptError> {
        let len = self.entries.len();
        let Some(entry) = self.entries.last_mut() else {
            return Err(PromptError::Idle);
        };
        let Some(slot) = entry.responses.iter().position(Option::is_none) else {
            return Err(PromptError::AlreadyAnswered);
        };
        let stored = match entry.run[slot].quote {
            Quote::Trim => text.trim_start_matches([' ', '\t']).to_string(),
            Quote::Keep => text.to_string(),
        };
        entry.responses[slot] = Some(stored);
        if let Some(next) = entry.next_prompt() {
            return Ok(Completion::Pending {
                prompt: next.to_string(),
            });
        }
        let below = len
            .checked_sub(2)
            .and_then(|i| self.entries[i].next_prompt())
            .map(str::to_string);
        Ok(Completion::Ready { below })
    }

    /// Resolve the fully answered top entry.
    ///
    /// Substitutes each response at its marker in the template, parses
    /// the result as a transient line and appends the deferred
    /// commands. The entry is popped either way; a line that no longer
    /// parses is reported through the parser's reporter and lost.
    pub fn process(&mut self, parser: &Parser) -> Result<Resolved<M>, PromptError> {
        let Some(entry) = self.entries.pop() else {
            return Err(PromptError::Idle);
        };
        if !entry.answered() {
            self.entries.push(entry);
            return Err(PromptError::Incomplete);
        }
        let Some(template) = entry.run.last().and_then(|p| p.template.as_deref()) else {
            return Err(PromptError::NoTemplate);
        };
        let line = substitute(template, &entry.run, &entry.responses);
        log::debug!("prompt chain resolved to {line:?}");
        let mut commands = parser.parse_line(&line, true, None)?;
        commands.extend(entry.defer);
        Ok(Resolved {
            commands,
            mark: entry.mark,
        })
    }

    /// Whether the top entry still has unanswered prompts.
    pub fn in_progress(&self) -> bool {
        self.entries.last().is_some_and(|e| !e.answered())
    }

    /// Text of the prompt currently soliciting input.
    pub fn current_prompt(&self) -> Option<&str> {
        self.entries.last().and_then(Entry::next_prompt)
    }

    /// Drop every entry. Interrupt/abort path; the only way entries go
    /// away unanswered.
    pub fn clear_all(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("discarding {} unresolved prompt entries", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

/// Splice responses into the template, skipping each 1-byte marker.
fn substitute(template: &str, run: &[PromptArgs], responses: &[Option<String>]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0usize;
    for (args, response) in run.iter().zip(responses) {
        let Some(text) = response else { continue };
        if let Some(lead) = template.get(cursor..args.insert_at) {
            out.push_str(lead);
            cursor = args.insert_at + 1;
        }
        out.push_str(text);
    }
    out.push_str(template.get(cursor..).unwrap_or_default());
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::CmdKind;
    use crate::error::SilentReporter;
    use crate::parse::{DEFAULT_ESCAPE, NoAliases, Parser};

    fn parser() -> Parser<'static> {
        Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE)
    }

    fn args(cmd: &Cmd) -> &PromptArgs {
        match &cmd.op {
            Op::Prompt(args) => args,
            other => panic!("not a prompt: {other:?}"),
        }
    }

    #[test]
    fn test_prescan_rewrites_and_records_offsets() {
        let run = prescan("cmdf &'File:' &`Mode:`", DEFAULT_ESCAPE, false).unwrap();
        assert_eq!(run.len(), 2);

        let first = args(&run[0]);
        assert_eq!(first.prompt, "File:");
        assert_eq!(first.insert_at, 5);
        assert!(!first.mult);
        assert_eq!(first.quote, Quote::Trim);
        assert_eq!(first.template, None);

        let second = args(&run[1]);
        assert_eq!(second.prompt, "Mode:");
        assert_eq!(second.insert_at, 7);
        assert!(second.mult);
        assert_eq!(second.quote, Quote::Keep);
        assert_eq!(second.template.as_deref(), Some("cmdf & &"));
    }

    #[test]
    fn test_prescan_no_marker_is_noop() {
        assert_eq!(prescan("es 'hello'; tt", DEFAULT_ESCAPE, false), None);
    }

    #[test]
    fn test_prescan_escaped_marker_is_literal() {
        assert_eq!(prescan("xd @& x", DEFAULT_ESCAPE, false), None);

        let run = prescan("msg @&here &'P'", DEFAULT_ESCAPE, false).unwrap();
        assert_eq!(run.len(), 1);
        assert_eq!(args(&run[0]).insert_at, 10);
        assert_eq!(args(&run[0]).template.as_deref(), Some("msg &here &"));
    }

    #[test]
    fn test_prescan_bare_and_unclosed_prompts() {
        // No quoted prompt string: empty prompt text.
        let run = prescan("cv &", DEFAULT_ESCAPE, false).unwrap();
        assert_eq!(args(&run[0]).prompt, "");
        assert_eq!(args(&run[0]).template.as_deref(), Some("cv &"));

        // Missing closer runs to the end of the body.
        let run = prescan("cmdf &'File", DEFAULT_ESCAPE, false).unwrap();
        assert_eq!(args(&run[0]).prompt, "File");
        assert_eq!(args(&run[0]).template.as_deref(), Some("cmdf &"));
    }

    #[test]
    fn test_prescan_transient_flag_carries() {
        let run = prescan("cv &", DEFAULT_ESCAPE, true).unwrap();
        assert!(run[0].transient);
    }

    #[test]
    fn test_issue_splits_run_from_deferred_tail() {
        let mut chain = prescan("cmdf &'A' &'B'", DEFAULT_ESCAPE, false).unwrap();
        chain.push(Cmd::simple(CmdKind::Tt));

        let mut stack = PromptStack::new();
        let first = stack.issue(chain, 0u32).unwrap();
        assert_eq!(first, "A");
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_prompt(), Some("A"));
        assert!(stack.in_progress());
    }

    #[test]
    fn test_issue_rejects_non_prompt_chains() {
        let mut stack = PromptStack::new();
        let err = stack.issue(vec![Cmd::simple(CmdKind::Tt)], 0u32);
        assert_eq!(err, Err(PromptError::NotAPrompt));
        assert_eq!(stack.issue(vec![], 0u32), Err(PromptError::NotAPrompt));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_complete_walks_prompts_in_order() {
        let chain = prescan("s/&'From:'/&`To:`/", DEFAULT_ESCAPE, false).unwrap();
        let mut stack = PromptStack::new();
        stack.issue(chain, 0u32).unwrap();

        // Leading blanks trim under ', stay under `.
        let step = stack.complete("  foo").unwrap();
        assert_eq!(
            step,
            Completion::Pending {
                prompt: "To:".to_string()
            }
        );
        let step = stack.complete("  bar").unwrap();
        assert_eq!(step, Completion::Ready { below: None });
        assert!(!stack.in_progress());

        let resolved = stack.process(&parser()).unwrap();
        assert_eq!(
            resolved.commands,
            parser().parse_line("s/foo/  bar/", true, None).unwrap()
        );
    }

    #[test]
    fn test_single_prompt_flow() {
        let parser = parser();
        let chain = parser.parse_body("cmdf &'File:'", false, None).unwrap();
        let mut stack = PromptStack::new();
        stack.issue(chain, 7u32).unwrap();

        assert_eq!(
            stack.complete("a.txt"),
            Ok(Completion::Ready { below: None })
        );
        assert_eq!(stack.complete(""), Err(PromptError::AlreadyAnswered));

        let resolved = stack.process(&parser).unwrap();
        assert_eq!(
            resolved.commands,
            parser.parse_line("cmdf a.txt", true, None).unwrap()
        );
        assert_eq!(resolved.mark, 7);
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.complete("late"), Err(PromptError::Idle));
    }

    #[test]
    fn test_process_requires_full_answers() {
        let chain = prescan("cmdf &'A' &'B'", DEFAULT_ESCAPE, false).unwrap();
        let mut stack = PromptStack::new();
        stack.issue(chain, 0u32).unwrap();
        stack.complete("one").unwrap();

        let err = stack.process(&parser());
        assert_eq!(err.unwrap_err(), PromptError::Incomplete);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_prompt(), Some("B"));
    }

    #[test]
    fn test_stacked_entries_resolve_lifo() {
        let mut stack = PromptStack::new();
        stack
            .issue(prescan("es &'Outer:'", DEFAULT_ESCAPE, false).unwrap(), 1u32)
            .unwrap();
        stack
            .issue(prescan("msg &'Inner:'", DEFAULT_ESCAPE, false).unwrap(), 2u32)
            .unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current_prompt(), Some("Inner:"));

        // Completing the top surfaces the outer entry's prompt.
        let step = stack.complete("hi").unwrap();
        assert_eq!(
            step,
            Completion::Ready {
                below: Some("Outer:".to_string())
            }
        );

        let resolved = stack.process(&parser()).unwrap();
        assert_eq!(resolved.mark, 2);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_prompt(), Some("Outer:"));
    }

    #[test]
    fn test_process_drops_entry_on_parse_failure() {
        let chain = prescan("zz &'Arg:'", DEFAULT_ESCAPE, false).unwrap();
        let mut stack = PromptStack::new();
        stack.issue(chain, 0u32).unwrap();
        stack.complete("q").unwrap();

        let err = stack.process(&parser());
        assert!(matches!(err, Err(PromptError::Parse(_))));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_process_without_template() {
        let args = PromptArgs {
            prompt: "P".to_string(),
            insert_at: 0,
            mult: false,
            quote: Quote::Trim,
            template: None,
        };
        let mut stack = PromptStack::new();
        stack.issue(vec![Cmd::new(Op::Prompt(args))], 0u32).unwrap();
        stack.complete("x").unwrap();
        assert_eq!(stack.process(&parser()), Err(PromptError::NoTemplate));
    }

    #[test]
    fn test_clear_all_discards_everything() {
        let mut stack = PromptStack::new();
        stack
            .issue(prescan("es &'A:'", DEFAULT_ESCAPE, false).unwrap(), 0u32)
            .unwrap();
        stack
            .issue(prescan("es &'B:'", DEFAULT_ESCAPE, false).unwrap(), 0u32)
            .unwrap();
        stack.clear_all();
        assert_eq!(stack.depth(), 0);
        assert!(!stack.in_progress());
        assert_eq!(stack.process(&parser()), Err(PromptError::Idle));
    }

    #[test]
    fn test_deferred_commands_follow_resolution() {
        let parser = parser();
        let mut chain = parser.parse_body("xc -f &'File:'", false, None).unwrap();
        chain.extend(parser.parse_line("tt; ad", false, None).unwrap());

        let mut stack = PromptStack::new();
        stack.issue(chain, 0u32).unwrap();
        stack.complete("/tmp/paste").unwrap();

        let resolved = stack.process(&parser).unwrap();
        let kinds: Vec<CmdKind> = resolved.commands.iter().map(Cmd::kind).collect();
        assert_eq!(kinds, vec![CmdKind::Xc, CmdKind::Tt, CmdKind::Ad]);
    }
}
