#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use logwitness::comparer::{LogMessageComparer, MatchMode};
use logwitness::message::{LogLevel, LogMessage};
use logwitness::scope::{ScopeStack, ScopeState};

fn mode_for(tag: u8) -> MatchMode {
    match tag % 5 {
        0 => MatchMode::Exact,
        1 => MatchMode::Contains,
        2 => MatchMode::Start,
        3 => MatchMode::End,
        _ => MatchMode::Regex,
    }
}

fn split(data: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(data);
    match text.split_once('\u{0}') {
        Some((a, b)) => (a.to_string(), b.to_string()),
        None => (text.to_string(), String::new()),
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&tag, rest)) = data.split_first() else {
        return;
    };
    let (actual_text, expected_text) = split(rest);
    let level = LogLevel::ALL[usize::from(tag >> 5) % LogLevel::ALL.len()];

    let actual = LogMessage::new(level, actual_text.clone()).with_logger_name("fuzz");
    let expected = LogMessage::new(level, expected_text.clone());
    let comparer = LogMessageComparer::for_mode(mode_for(tag));

    // Arbitrary patterns must never panic, only fail to match.
    let matched = comparer.equals(&actual, &expected);

    // Exact implies every looser literal mode.
    if comparer.mode() == MatchMode::Exact && matched {
        assert!(LogMessageComparer::CONTAINS.equals(&actual, &expected));
        assert!(LogMessageComparer::START.equals(&actual, &expected));
        assert!(LogMessageComparer::END.equals(&actual, &expected));
    }

    // Every message contains itself.
    assert!(LogMessageComparer::CONTAINS.equals(&actual, &LogMessage::new(level, actual_text.clone())));

    // Scope flattening of arbitrary pairs keeps every pair in order.
    let stack = Arc::new(ScopeStack::new());
    let outer = stack.push(ScopeState::from([(actual_text.as_str(), expected_text.as_str())]));
    let inner = stack.push(ScopeState::from(expected_text.as_str()));
    let props = stack.current_properties();
    assert_eq!(props.len(), 2);
    assert_eq!(props[0].0, actual_text);
    assert_eq!(inner.close(), Ok(()));
    assert_eq!(outer.close(), Ok(()));
    assert_eq!(stack.depth(), 0);
});
