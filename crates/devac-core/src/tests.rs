//! Unit tests for devac-core

use crate::hooks::*;
use crate::identity::*;
use crate::model::*;
use std::io::Write;
use std::path::Path;

#[test]
fn test_entity_id_deterministic() {
    let id1 = entity_id(
        "my-repo",
        Path::new("packages/api"),
        Path::new("src/index.ts"),
        NodeKind::Function,
        "src/index.ts::handler",
        "",
    );
    let id2 = entity_id(
        "my-repo",
        Path::new("packages/api"),
        Path::new("src/index.ts"),
        NodeKind::Function,
        "src/index.ts::handler",
        "",
    );
    assert_eq!(id1, id2);

    // Different qualified names must diverge in the hash segment.
    let other = entity_id(
        "my-repo",
        Path::new("packages/api"),
        Path::new("src/index.ts"),
        NodeKind::Function,
        "src/index.ts::other",
        "",
    );
    assert_ne!(id1, other);
}

#[test]
fn test_entity_id_shape() {
    let id = entity_id(
        "repo",
        Path::new("."),
        Path::new("src/helper.ts"),
        NodeKind::Function,
        "src/helper.ts::h1",
        "",
    );
    let parts: Vec<&str> = id.split(':').collect();
    assert_eq!(parts.len(), 5);
    assert_eq!(parts[0], "repo");
    assert_eq!(parts[1], ".");
    assert_eq!(parts[2], "src/helper.ts");
    assert_eq!(parts[3], "function");
    assert_eq!(parts[4].len(), 8);
    assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_entity_id_overload_disambiguator() {
    let a = entity_id(
        "r",
        Path::new("."),
        Path::new("src/svc.cs"),
        NodeKind::Method,
        "Svc.Run",
        "0",
    );
    let b = entity_id(
        "r",
        Path::new("."),
        Path::new("src/svc.cs"),
        NodeKind::Method,
        "Svc.Run",
        "1",
    );
    assert_ne!(a, b);
}

#[test]
fn test_normalize_path_forward_slashes() {
    assert_eq!(normalize_path(Path::new("src/a/b.ts")), "src/a/b.ts");
    // Windows-style separators are rewritten, nothing else is.
    let mixed = String::from("src\\a\\b.ts");
    assert_eq!(normalize_path(Path::new(&mixed)), "src/a/b.ts");
}

#[test]
fn test_file_hash_matches_content_hash() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"export const x = 1;\n").unwrap();
    let on_disk = file_hash(tmp.path()).unwrap();
    assert_eq!(on_disk, content_hash(b"export const x = 1;\n"));
    assert_eq!(on_disk.len(), 64);
}

#[test]
fn test_unresolved_sentinel() {
    let edge = EdgeRecord {
        source_entity_id: "r:.:a.ts:function:aaaaaaaa".into(),
        target_entity_id: unresolved_target("helper"),
        edge_type: EdgeKind::Calls,
        file_path: Some("a.ts".into()),
        line: Some(3),
        column: Some(1),
        properties: None,
        source_file_hash: "h".into(),
        branch: BRANCH_BASE.into(),
        is_deleted: false,
        updated_at: now_millis(),
    };
    assert!(edge.is_unresolved());
    assert_eq!(edge.unresolved_symbol(), Some("helper"));
}

#[test]
fn test_effect_payload_tagged_json() {
    let payload = EffectPayload::FunctionCall {
        callee_name: "fetch".into(),
        is_external: true,
        is_async: true,
        external_module: Some("node-fetch".into()),
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("\"effect_type\":\"FunctionCall\""));
    let back: EffectPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(payload, back);

    let store = EffectPayload::Store {
        target_resource: "users".into(),
        operation: "insert".into(),
    };
    assert_eq!(store.effect_type(), "Store");
}

#[test]
fn test_kind_round_trips() {
    for kind in [
        NodeKind::Module,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Enum,
        NodeKind::TypeAlias,
        NodeKind::Constant,
        NodeKind::Property,
        NodeKind::Parameter,
    ] {
        assert_eq!(NodeKind::parse_kind(kind.as_str()), Some(kind));
    }
    for kind in [
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::Extends,
        EdgeKind::Implements,
        EdgeKind::References,
        EdgeKind::Defines,
        EdgeKind::Exports,
    ] {
        assert_eq!(EdgeKind::parse_kind(kind.as_str()), Some(kind));
    }
}

#[test]
fn test_language_detection() {
    let cases = [
        ("main.ts", Some(Language::TypeScript)),
        ("app.tsx", Some(Language::TypeScript)),
        ("app.js", Some(Language::JavaScript)),
        ("lib.py", Some(Language::Python)),
        ("Service.cs", Some(Language::CSharp)),
        ("main.go", None),
        ("README.md", None),
    ];
    for (filename, expected) in cases {
        assert_eq!(
            Language::from_path(Path::new(filename)),
            expected,
            "failed for {filename}"
        );
    }
}

#[test]
fn test_hook_output_stop_reason() {
    let out = HookOutput::Stop {
        stop_reason: "Validation found issues".into(),
    };
    let json = out.to_json().unwrap();
    assert!(json.contains("stopReason"));
}

#[test]
fn test_hook_output_context_requires_wrap() {
    let bad = HookOutput::UserPromptContext {
        additional_context: "no wrap here".into(),
    };
    assert!(bad.to_json().is_err());

    let ok = HookOutput::context("3 errors outstanding");
    let json = ok.to_json().unwrap();
    assert!(json.contains("UserPromptSubmit"));
    assert!(json.contains("<system-reminder>"));

    // Empty body is permitted.
    let empty = HookOutput::context("");
    assert!(empty.to_json().is_ok());
}

#[test]
fn test_parse_hook_output_stop_reason() {
    let stdout = serde_json::json!({
        "stopReason": "Validation found issues:\n- 2 TypeScript errors in src/error.ts\n\nConsider fixing these before continuing."
    })
    .to_string();
    let parsed = parse_hook_output(&stdout);
    assert!(parsed.valid);
    assert_eq!(parsed.counts, IssueCounts { errors: 2, warnings: 0 });
}

#[test]
fn test_parse_hook_output_rejects_unknown_shape() {
    let parsed = parse_hook_output(r#"{"wrongField":"x"}"#);
    assert!(!parsed.valid);
    assert_eq!(parsed.error.as_deref(), Some("Schema validation failed"));

    let parsed = parse_hook_output("not json at all");
    assert!(!parsed.valid);
    assert_eq!(parsed.error.as_deref(), Some("Invalid JSON"));
}

#[test]
fn test_parse_hook_output_legacy_stop() {
    let stdout = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "Stop",
            "additionalContext": "<system-reminder>1 error</system-reminder>"
        }
    })
    .to_string();
    let parsed = parse_hook_output(&stdout);
    assert!(parsed.valid);
    assert_eq!(parsed.counts.errors, 1);
}

#[test]
fn test_parse_hook_output_unwrapped_context_invalid() {
    let stdout = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "UserPromptSubmit",
            "additionalContext": "missing the wrapper"
        }
    })
    .to_string();
    assert!(!parse_hook_output(&stdout).valid);
}

#[test]
fn test_status_line_parsing() {
    assert_eq!(
        parse_status_line("DevAC Status: 5 errors, 3 warnings"),
        IssueCounts { errors: 5, warnings: 3 }
    );
    assert_eq!(
        parse_status_line("No issues found"),
        IssueCounts { errors: 0, warnings: 0 }
    );
    assert_eq!(
        parse_status_line("5 ERRORS and 3 WARNINGS"),
        IssueCounts { errors: 5, warnings: 3 }
    );
}
