// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Hangman variable substitution: `__MSG_key__`, `__BIDI_key__`,
//! `__UP_key__` and `__MODULE_key__` tokens.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"__(MSG|BIDI|UP|MODULE)_((?:[^_]|_[^_])+?)__")
        .expect("hangman token pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstitutionType {
    Message,
    Bidi,
    UserPref,
    Module,
}

impl SubstitutionType {
    pub fn prefix(&self) -> &'static str {
        match self {
            SubstitutionType::Message => "MSG",
            SubstitutionType::Bidi => "BIDI",
            SubstitutionType::UserPref => "UP",
            SubstitutionType::Module => "MODULE",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "MSG" => Some(SubstitutionType::Message),
            "BIDI" => Some(SubstitutionType::Bidi),
            "UP" => Some(SubstitutionType::UserPref),
            "MODULE" => Some(SubstitutionType::Module),
            _ => None,
        }
    }
}

/// Per-type key/value tables applied to gadget text in a single pass.
///
/// Replacement output is never rescanned, and a token whose key has no value
/// is left exactly as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions {
    values: HashMap<SubstitutionType, HashMap<String, String>>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_substitution(&mut self, kind: SubstitutionType, key: &str, value: &str) {
        self.values
            .entry(kind)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn add_substitutions<'a, I>(&mut self, kind: SubstitutionType, entries: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let table = self.values.entry(kind).or_default();
        for (key, value) in entries {
            table.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, kind: SubstitutionType, key: &str) -> Option<&str> {
        self.values
            .get(&kind)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(HashMap::is_empty)
    }

    pub fn substitute_string(&self, input: &str) -> String {
        if !input.contains("__") || self.is_empty() {
            return input.to_string();
        }
        TOKEN
            .replace_all(input, |caps: &Captures| {
                SubstitutionType::from_prefix(&caps[1])
                    .and_then(|kind| self.get(kind, &caps[2]))
                    .map(str::to_string)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_known_type() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "hello", "Hola");
        subst.add_substitution(SubstitutionType::Bidi, "START_EDGE", "left");
        subst.add_substitution(SubstitutionType::UserPref, "name", "Ana");
        subst.add_substitution(SubstitutionType::Module, "ID", "7");

        let out = subst.substitute_string("__MSG_hello__ __UP_name__ (__BIDI_START_EDGE__) #__MODULE_ID__");
        assert_eq!(out, "Hola Ana (left) #7");
    }

    #[test]
    fn missing_key_leaves_token_verbatim() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "present", "yes");
        assert_eq!(subst.substitute_string("__MSG_missing__"), "__MSG_missing__");
        assert_eq!(
            subst.substitute_string("__MSG_present__/__MSG_missing__"),
            "yes/__MSG_missing__"
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "a", "__MSG_b__");
        subst.add_substitution(SubstitutionType::Message, "b", "boom");
        assert_eq!(subst.substitute_string("__MSG_a__"), "__MSG_b__");
    }

    #[test]
    fn keys_may_contain_underscores_and_dots() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "greeting_text.v2", "hi");
        assert_eq!(subst.substitute_string("[__MSG_greeting_text.v2__]"), "[hi]");
    }

    #[test]
    fn keys_run_to_the_next_double_underscore() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "größe", "size");
        subst.add_substitution(SubstitutionType::UserPref, "full name", "Ana Lima");
        assert_eq!(
            subst.substitute_string("__MSG_größe__: __UP_full name__"),
            "size: Ana Lima"
        );
        assert_eq!(subst.substitute_string("__UP_a_b__"), "__UP_a_b__");
    }

    #[test]
    fn unknown_prefixes_are_not_tokens() {
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "x", "y");
        assert_eq!(subst.substitute_string("__FOO_x__"), "__FOO_x__");
    }
}
