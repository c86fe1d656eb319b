use regex::Regex;
use relwatch::domain::commands::{run, MissClass, MissMask, UrlCommand};

fn split(text: &str, index: i64, ignore_miss: bool) -> UrlCommand {
    UrlCommand::Split {
        text: text.to_string(),
        index,
        ignore_miss,
    }
}

fn replace(old: &str, new: &str) -> UrlCommand {
    UrlCommand::Replace {
        old: old.to_string(),
        new: new.to_string(),
        ignore_miss: false,
    }
}

fn regex(pattern: &str, index: i64, ignore_miss: bool) -> UrlCommand {
    UrlCommand::Regex {
        pattern: Regex::new(pattern).unwrap(),
        index,
        ignore_miss,
    }
}

fn regex_submatch(pattern: &str, index: i64, ignore_miss: bool) -> UrlCommand {
    UrlCommand::RegexSubmatch {
        pattern: Regex::new(pattern).unwrap(),
        index,
        ignore_miss,
    }
}

fn run_one(commands: &[UrlCommand], input: &str, mask: &mut MissMask) -> Result<String, String> {
    run(commands, input, "svc", "mon", mask).map_err(|e| e.to_string())
}

#[test]
fn split_keeps_indexed_element() {
    let mut mask = MissMask::default();
    let out = run_one(&[split("-", 1, false)], "a-b-c", &mut mask).unwrap();
    assert_eq!(out, "b");
}

#[test]
fn split_negative_index_counts_from_end() {
    let mut mask = MissMask::default();
    let out = run_one(&[split("-", -1, false)], "a-b-c", &mut mask).unwrap();
    assert_eq!(out, "c");
}

#[test]
fn split_without_separator_aborts_and_marks_class_0() {
    let mut mask = MissMask::default();
    let err = run_one(&[split("|", 0, false)], "a-b-c", &mut mask).unwrap_err();
    assert!(err.contains("didn't find any"));
    assert!(mask.is_set(MissClass::SplitNoMatch));
    assert!(!mask.is_set(MissClass::SplitIndexOutOfRange));
}

#[test]
fn split_index_out_of_range_is_class_1() {
    let mut mask = MissMask::default();
    let err = run_one(&[split("-", 5, false)], "a-b", &mut mask).unwrap_err();
    assert!(err.contains("2 elements"));
    assert!(mask.is_set(MissClass::SplitIndexOutOfRange));
    assert!(!mask.is_set(MissClass::SplitNoMatch));
}

#[test]
fn ignored_miss_restores_text_and_continues() {
    let mut mask = MissMask::default();
    let commands = [split("|", 0, true), split("-", 0, false)];
    let out = run_one(&commands, "a-b", &mut mask).unwrap();
    assert_eq!(out, "a");
    assert!(mask.is_set(MissClass::SplitNoMatch));
}

#[test]
fn replace_never_misses_and_length_law_holds() {
    let mut mask = MissMask::default();
    let input = "v1.2.3-v-v";
    let (old, new) = ("v", "ver");
    let out = run_one(&[replace(old, new)], input, &mut mask).unwrap();
    assert_eq!(out, "ver1.2.3-ver-ver");
    let occurrences = input.matches(old).count();
    assert_eq!(
        out.len(),
        input.len() + occurrences * (new.len() - old.len())
    );
    assert_eq!(mask, MissMask::default());
}

#[test]
fn regex_collects_all_matches() {
    let mut mask = MissMask::default();
    let out = run_one(&[regex("[0-9]+", 2, false)], "a1 b22 c333", &mut mask).unwrap();
    assert_eq!(out, "333");
    let out = run_one(&[regex("[0-9]+", -2, false)], "a1 b22 c333", &mut mask).unwrap();
    assert_eq!(out, "22");
}

#[test]
fn regex_without_match_is_class_2() {
    let mut mask = MissMask::default();
    let err = run_one(&[regex("[0-9]+", 0, false)], "no digits", &mut mask).unwrap_err();
    assert!(err.contains("didn't return any matches"));
    assert!(mask.is_set(MissClass::RegexNoMatch));
}

#[test]
fn regex_index_out_of_range_is_class_3() {
    let mut mask = MissMask::default();
    let err = run_one(&[regex("[0-9]+", 9, false)], "a1 b2", &mut mask).unwrap_err();
    assert!(err.contains("wants element number 10"));
    assert!(mask.is_set(MissClass::RegexIndexOutOfRange));
}

#[test]
fn regex_submatch_selects_capture_group() {
    let mut mask = MissMask::default();
    let out = run_one(&[regex_submatch("v(.*)", 1, false)], "v1.14.2", &mut mask).unwrap();
    assert_eq!(out, "1.14.2");
}

#[test]
fn regex_submatch_negative_index_counts_from_group_list() {
    let mut mask = MissMask::default();
    // List is [whole match, group 1]; -1 lands on group 1.
    let out = run_one(
        &[regex_submatch("v([0-9.]+)", -1, false)],
        "v1.14.2",
        &mut mask,
    )
    .unwrap();
    assert_eq!(out, "1.14.2");
}

#[test]
fn all_ignored_program_never_aborts() {
    let mut mask = MissMask::default();
    let commands = [
        split("|", 3, true),
        regex("zzz", 0, true),
        regex_submatch("q(x)", 5, true),
        replace("nothing", "here"),
    ];
    let out = run_one(&commands, "plain input", &mut mask).unwrap();
    assert_eq!(out, "plain input");
}

#[test]
fn miss_mask_marks_each_class_once() {
    let mut mask = MissMask::default();
    assert!(mask.mark(MissClass::SplitNoMatch));
    assert!(!mask.mark(MissClass::SplitNoMatch));
    assert!(mask.mark(MissClass::RegexNoMatch));
    assert!(!mask.mark(MissClass::RegexNoMatch));
    assert!(mask.is_set(MissClass::SplitNoMatch));
    assert!(mask.is_set(MissClass::RegexNoMatch));
    assert!(!mask.is_set(MissClass::SplitIndexOutOfRange));
    assert!(!mask.is_set(MissClass::RegexIndexOutOfRange));
}

#[test]
fn pipeline_chains_commands_in_order() {
    let mut mask = MissMask::default();
    let commands = [
        split("\"tag_name\":\"", 1, false),
        split("\"", 0, false),
        replace("v", ""),
    ];
    let out = run_one(
        &commands,
        r#"{"id":1,"tag_name":"v1.14.2","name":"x"}"#,
        &mut mask,
    )
    .unwrap();
    assert_eq!(out, "1.14.2");
}
