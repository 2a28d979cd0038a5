//! Resource rule tables embedded in `CodeResources`.
//!
//! Rules tell a verifier how to treat each resource path. They are fixed
//! tables, not derived from bundle contents, and are written into the
//! manifest verbatim under `rules` (legacy) and `rules2` (extended).
//!
//! When several patterns match a path, the rule with the highest weight
//! governs it. Ties go to the rule listed first.

use plist::{Dictionary, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Weight a verifier assigns to a rule that does not state one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Flags carried by a resource rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFlags {
    /// Exclude matching paths from verification.
    pub omit: bool,
    /// Matching paths may be absent.
    pub optional: bool,
    /// Matching paths are nested code verified on their own.
    pub nested: bool,
}

/// A single `{pattern, weight, flags}` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Regular expression matched against bundle-relative paths.
    pub pattern: &'static str,
    /// Precedence among matching rules, `None` for plain include rules.
    pub weight: Option<f64>,
    pub flags: RuleFlags,
}

impl Rule {
    /// A plain include rule, serialized as a bare `true`.
    const fn include(pattern: &'static str) -> Self {
        Self {
            pattern,
            weight: None,
            flags: RuleFlags {
                omit: false,
                optional: false,
                nested: false,
            },
        }
    }

    const fn weighted(pattern: &'static str, weight: f64) -> Self {
        Self {
            pattern,
            weight: Some(weight),
            flags: RuleFlags {
                omit: false,
                optional: false,
                nested: false,
            },
        }
    }

    const fn omit(mut self) -> Self {
        self.flags.omit = true;
        self
    }

    const fn optional(mut self) -> Self {
        self.flags.optional = true;
        self
    }

    const fn nested(mut self) -> Self {
        self.flags.nested = true;
        self
    }

    /// Weight used for precedence resolution.
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }

    /// Property list form: `true` for plain includes, otherwise a dictionary
    /// with the set flags and the weight.
    pub fn to_value(&self) -> Value {
        let flags = self.flags;
        if self.weight.is_none() && flags == RuleFlags::default() {
            return Value::Boolean(true);
        }

        let mut dict = Dictionary::new();
        if flags.nested {
            dict.insert("nested".to_string(), Value::Boolean(true));
        }
        if flags.omit {
            dict.insert("omit".to_string(), Value::Boolean(true));
        }
        if flags.optional {
            dict.insert("optional".to_string(), Value::Boolean(true));
        }
        if let Some(weight) = self.weight {
            dict.insert("weight".to_string(), Value::Real(weight));
        }
        Value::Dictionary(dict)
    }
}

const LEGACY_RULES: &[Rule] = &[
    Rule::include("^"),
    Rule::weighted("^.*\\.lproj/", 1000.0).optional(),
    Rule::weighted("^.*\\.lproj/locversion.plist$", 1100.0).omit(),
    Rule::include("^version.plist$"),
];

const EXTENDED_RULES: &[Rule] = &[
    Rule::weighted(".*\\.dSYM($|/)", 11.0),
    Rule::weighted("^", 11.0),
    Rule::weighted("^(.*/)?\\.DS_Store$", 2000.0).omit(),
    Rule::weighted(
        "^(Frameworks|SharedFrameworks|PlugIns|Plug-ins|XPCServices|Helpers|MacOS|Library/(Automator|Spotlight|LoginItems))/",
        10.0,
    )
    .nested(),
    Rule::include("^.*"),
    Rule::weighted("^.*\\.lproj/", 1000.0).optional(),
    Rule::weighted("^.*\\.lproj/locversion.plist$", 1100.0).omit(),
    Rule::weighted("^Info\\.plist$", 20.0).omit(),
    Rule::weighted("^PkgInfo$", 20.0).omit(),
    Rule::weighted("^[^/]+$", 10.0).nested(),
    Rule::weighted("^embedded\\.provisionprofile$", 20.0),
    Rule::weighted("^version\\.plist$", 20.0),
];

static LEGACY: LazyLock<RuleTable> = LazyLock::new(|| RuleTable::compile(LEGACY_RULES));
static EXTENDED: LazyLock<RuleTable> = LazyLock::new(|| RuleTable::compile(EXTENDED_RULES));

/// An ordered, compiled set of resource rules.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<(Rule, Regex)>,
}

impl RuleTable {
    /// The legacy table written under `rules`.
    pub fn legacy() -> &'static RuleTable {
        &LEGACY
    }

    /// The extended table written under `rules2`.
    pub fn extended() -> &'static RuleTable {
        &EXTENDED
    }

    fn compile(rules: &[Rule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(rule.pattern).expect("built-in rule pattern must compile");
                (rule.clone(), regex)
            })
            .collect();
        Self { rules }
    }

    /// Rules in table order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|(rule, _)| rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the rule that governs `relative_path`.
    ///
    /// Returns the matching rule with the highest weight; among equal
    /// weights the earliest rule wins. `None` if nothing matches.
    pub fn resolve(&self, relative_path: &str) -> Option<&Rule> {
        let mut best: Option<&Rule> = None;
        for (rule, regex) in &self.rules {
            if !regex.is_match(relative_path) {
                continue;
            }
            match best {
                Some(current) if current.effective_weight() >= rule.effective_weight() => {}
                _ => best = Some(rule),
            }
        }
        best
    }

    /// Property list dictionary keyed by pattern, in table order.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for rule in self.rules() {
            dict.insert(rule.pattern.to_string(), rule.to_value());
        }
        dict
    }
}
