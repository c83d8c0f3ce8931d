//! Engine Flow Tests
//!
//! End-to-end runs across the whole engine: parse typed definitions,
//! flatten them, share them through a property store, inflate them on
//! the peer side, and drive prompt chains to resolution.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;

use dmc::cmd::render_chain;
use dmc::error::{PromptError, Reporter, Severity, SilentReporter};
use dmc::keys::KeySpec;
use dmc::parse::{DEFAULT_ESCAPE, NoAliases, Parser};
use dmc::prompt::{Completion, PromptStack};
use dmc::wire::store::{
    PropertyStore, StoreSync, SyncAction, find_binding, flatten_bindings, inflate_bindings,
};
use dmc::wire::{flatten, inflate};

fn parser() -> Parser<'static> {
    Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE)
}

/// Collects every diagnostic the parser emits.
#[derive(Default)]
struct Recorder {
    messages: RefCell<Vec<(Severity, String)>>,
}

impl Reporter for Recorder {
    fn report(&self, severity: Severity, message: &str) {
        self.messages
            .borrow_mut()
            .push((severity, message.to_string()));
    }
}

/// Property store backed by a plain file, standing in for the shared
/// root-object property real sessions use.
struct FileStore {
    path: PathBuf,
}

impl PropertyStore for FileStore {
    fn size(&self) -> usize {
        std::fs::metadata(&self.path)
            .map(|m| m.len() as usize)
            .unwrap_or(0)
    }

    fn read_from(&self, offset: usize) -> Vec<u8> {
        let bytes = std::fs::read(&self.path).unwrap_or_default();
        bytes.get(offset..).unwrap_or_default().to_vec()
    }

    fn append(&mut self, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .unwrap();
        file.write_all(bytes).unwrap();
    }

    fn rewrite(&mut self, bytes: &[u8]) {
        std::fs::write(&self.path, bytes).unwrap();
    }
}

// =============================================================================
// BINDING DISTRIBUTION
// =============================================================================

#[test]
fn binding_table_survives_store_round_trip() {
    let parser = parser();
    let table = vec![
        (
            "f1".parse::<KeySpec>().unwrap().to_string(),
            parser.parse_body("es 'saved'; tt", false, None).unwrap(),
        ),
        (
            "^b".parse::<KeySpec>().unwrap().to_string(),
            parser.parse_body("5; xc", false, None).unwrap(),
        ),
        (
            "m2u".parse::<KeySpec>().unwrap().to_string(),
            parser.parse_body("[1,1]; ad", false, None).unwrap(),
        ),
    ];

    let bytes = flatten_bindings(table.iter().map(|(k, c)| (k.as_str(), c.as_slice()))).unwrap();
    let decoded = inflate_bindings(&bytes);
    assert_eq!(decoded.error, None);
    assert_eq!(decoded.bindings, table);

    // Single-key lookup skips the other entries via their length prefix.
    let hit = find_binding(&bytes, "^b").unwrap();
    assert_eq!(hit.error, None);
    assert_eq!(hit.cmds, table[1].1);
    assert!(find_binding(&bytes, "f2").is_none());
}

#[test]
fn shared_file_store_syncs_two_processes() {
    let parser = parser();
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore {
        path: dir.path().join("bindings.dat"),
    };
    let mut writer = StoreSync::new();
    let mut reader = StoreSync::new();

    // First definition: the reader decodes exactly the appended bytes.
    let first = parser.parse_body("es 'one'", false, None).unwrap();
    writer.publish(&mut store, &flatten_bindings([("f1", first.as_slice())]).unwrap());
    assert_eq!(writer.note_change(&store), SyncAction::None);
    let SyncAction::Suffix(tail) = reader.note_change(&store) else {
        panic!("reader should see growth");
    };
    let decoded = inflate_bindings(&tail);
    assert_eq!(decoded.bindings, vec![("f1".to_string(), first.clone())]);

    // Second definition arrives as a suffix containing only itself.
    let second = parser.parse_body("tt; ab", false, None).unwrap();
    writer.publish(&mut store, &flatten_bindings([("f2", second.as_slice())]).unwrap());
    assert_eq!(writer.note_change(&store), SyncAction::None);
    let SyncAction::Suffix(tail) = reader.note_change(&store) else {
        panic!("reader should see growth");
    };
    let decoded = inflate_bindings(&tail);
    assert_eq!(decoded.bindings, vec![("f2".to_string(), second)]);

    // A rewrite shrinks the property; the reader reloads everything.
    let only = flatten_bindings([("f1", first.as_slice())]).unwrap();
    writer.publish_rewrite(&mut store, &only);
    assert_eq!(writer.note_change(&store), SyncAction::None);
    assert_eq!(reader.note_change(&store), SyncAction::Reload(only));

    // Quiet store, nothing to do on either side.
    assert_eq!(writer.note_change(&store), SyncAction::None);
    assert_eq!(reader.note_change(&store), SyncAction::None);
}

// =============================================================================
// PROMPT FLOW
// =============================================================================

#[test]
fn prompt_binding_end_to_end() {
    let parser = parser();

    // A definition body that prompts for a file name, as a peer
    // process receives it off the wire.
    let chain = parser.parse_body("cmdf &'File:'", false, None).unwrap();
    let decoded = inflate(&flatten(&chain).unwrap());
    assert_eq!(decoded.error, None);
    assert_eq!(decoded.cmds, chain);

    // The peer executes it: prompt, answer, resolve.
    let mut prompts: PromptStack<(u32, u32)> = PromptStack::new();
    let shown = prompts.issue(decoded.cmds, (3, 7)).unwrap();
    assert_eq!(shown, "File:");
    assert!(prompts.in_progress());

    assert_eq!(
        prompts.complete("a.txt"),
        Ok(Completion::Ready { below: None })
    );
    assert_eq!(prompts.complete("again"), Err(PromptError::AlreadyAnswered));

    let resolved = prompts.process(&parser).unwrap();
    assert_eq!(resolved.mark, (3, 7));
    assert_eq!(
        resolved.commands,
        parser.parse_line("cmdf a.txt", true, None).unwrap()
    );
    assert!(!prompts.in_progress());
    assert_eq!(prompts.depth(), 0);
}

#[test]
fn chained_prompts_resolve_with_deferred_tail() {
    let parser = parser();
    let mut chain = parser
        .parse_body("s/&'Search:'/&`Replace:`/", false, None)
        .unwrap();
    chain.extend(parser.parse_line("tt", false, None).unwrap());

    let mut prompts = PromptStack::new();
    let first = prompts.issue(chain, 0u8).unwrap();
    assert_eq!(first, "Search:");

    // Plain-quoted prompts trim leading blanks, backquoted keep them.
    let step = prompts.complete("  old").unwrap();
    assert_eq!(
        step,
        Completion::Pending {
            prompt: "Replace:".to_string()
        }
    );
    let step = prompts.complete("  new").unwrap();
    assert_eq!(step, Completion::Ready { below: None });

    let resolved = prompts.process(&parser).unwrap();
    let mut expected = parser.parse_line("s/old/  new/", true, None).unwrap();
    expected.extend(parser.parse_line("tt", false, None).unwrap());
    assert_eq!(resolved.commands, expected);
}

// =============================================================================
// STATEMENT ISOLATION
// =============================================================================

#[test]
fn failing_statement_reports_once_and_fails_line() {
    let recorder = Recorder::default();
    let parser = Parser::new(&NoAliases, &recorder, DEFAULT_ESCAPE);

    assert!(parser.parse_line("tt; zz 1; ad", false, None).is_err());
    let messages = recorder.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Severity::Error);
    assert!(messages[0].1.contains("zz"));
}

#[test]
fn unsupported_statement_warns_and_line_continues() {
    let recorder = Recorder::default();
    let parser = Parser::new(&NoAliases, &recorder, DEFAULT_ESCAPE);

    let cmds = parser.parse_line("mono; tt", false, None).unwrap();
    assert_eq!(cmds.len(), 1);
    let messages = recorder.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Severity::Warning);
    assert!(messages[0].1.contains("mono"));
}

// =============================================================================
// FULL-CIRCLE STABILITY
// =============================================================================

#[test]
fn render_wire_full_circle() {
    let parser = parser();
    let sources = [
        "s/foo/bar/",
        "kd f1 es 'hi' ke",
        "5; tt; =",
        "!-c make all",
        "[2,3]; (10,20)",
        "dq -s -c 2 myproc",
    ];
    for src in sources {
        let chain = parser.parse_line(src, false, None).unwrap();
        let bytes = flatten(&chain).unwrap();
        let inflated = inflate(&bytes);
        assert_eq!(inflated.error, None, "{src}");

        let rendered = render_chain(&inflated.cmds, DEFAULT_ESCAPE);
        let reparsed = parser.parse_line(&rendered, false, None).unwrap();
        assert_eq!(reparsed, chain, "{src} -> {rendered}");
        assert_eq!(flatten(&reparsed).unwrap(), bytes, "{src}");
    }

    // Prompt runs rebuild their marker form from the template.
    let chain = parser
        .parse_body("cmdf &'File:' &`Mode:`", false, None)
        .unwrap();
    let rendered = render_chain(&chain, DEFAULT_ESCAPE);
    let reparsed = parser.parse_body(&rendered, false, None).unwrap();
    assert_eq!(reparsed, chain, "{rendered}");
}
