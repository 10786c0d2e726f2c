//! Rule tables driving every pipeline stage.
//!
//! The tables are plain data: they can be loaded from a TOML file, and any
//! field missing from the file keeps its built-in value. A [`RuleTables`] is
//! validated and has all of its patterns compiled when it is constructed, and
//! is never mutated afterwards; reloading means building a new one.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::query_router::types::query::Intent;

const DATE: &str = r"([0-9]{4}(?:-[0-9]{2}-[0-9]{2})?)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKeyword {
    pub phrase: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentKeywords {
    pub intent: Intent,
    pub keywords: Vec<WeightedKeyword>,
}

/// Serializable rule data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub version: String,
    /// Inputs longer than this many characters are rejected.
    pub max_query_length: usize,
    /// Misspelled key (lowercase, alphanumeric) to its correction.
    pub misspellings: BTreeMap<String, String>,
    pub intents: Vec<IntentKeywords>,
    pub status_words: Vec<String>,
    pub stop_words: Vec<String>,
    pub company_names: Vec<String>,
    pub company_suffixes: Vec<String>,
    pub parts_keywords: Vec<String>,
    pub creation_keywords: Vec<String>,
    pub past_tense_verbs: Vec<String>,
    pub attribution_markers: Vec<String>,
    pub query_verbs: Vec<String>,
    pub help_phrases: Vec<String>,
    pub back_references: Vec<String>,
    pub suggestions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn keywords(intent: Intent, items: &[(&str, f64)]) -> IntentKeywords {
    IntentKeywords {
        intent,
        keywords: items
            .iter()
            .map(|(phrase, weight)| WeightedKeyword {
                phrase: (*phrase).to_string(),
                weight: *weight,
            })
            .collect(),
    }
}

impl RuleSet {
    /// Reads a TOML rule file; fields it omits keep their built-in values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse rules file {}", path.display()))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        let misspellings = [
            ("contrst", "contract"),
            ("contrct", "contract"),
            ("contarct", "contract"),
            ("cntract", "contract"),
            ("conract", "contract"),
            ("contracr", "contract"),
            ("kontract", "contract"),
            ("contrat", "contract"),
            ("contrcts", "contracts"),
            ("contarcts", "contracts"),
            ("contracst", "contracts"),
            ("prt", "part"),
            ("prts", "parts"),
            ("aprts", "parts"),
            ("partz", "parts"),
            ("crated", "created"),
            ("creatd", "created"),
            ("cretaed", "created"),
            ("craeted", "created"),
            ("staus", "status"),
            ("stauts", "status"),
            ("satus", "status"),
            ("expird", "expired"),
            ("exipred", "expired"),
            ("expried", "expired"),
            ("acitve", "active"),
            ("actve", "active"),
            ("activ", "active"),
            ("custmer", "customer"),
            ("cusotmer", "customer"),
            ("custoemr", "customer"),
            ("costumer", "customer"),
            ("acount", "account"),
            ("accont", "account"),
            ("numbr", "number"),
            ("nubmer", "number"),
            ("shwo", "show"),
            ("sohw", "show"),
            ("lsit", "list"),
            ("detials", "details"),
            ("specfications", "specifications"),
            ("specifcations", "specifications"),
            ("datasheat", "datasheet"),
            ("btween", "between"),
            ("betwen", "between"),
            ("aftr", "after"),
            ("befor", "before"),
            ("awrd", "award"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let intents = vec![
            keywords(
                Intent::StatusCheck,
                &[
                    ("status", 1.5),
                    ("active", 1.5),
                    ("expired", 1.5),
                    ("inactive", 1.5),
                    ("expiring", 1.2),
                    ("pending", 1.0),
                    ("terminated", 1.0),
                    ("expiration date", 1.0),
                ],
            ),
            keywords(
                Intent::Customer,
                &[
                    ("customer", 2.0),
                    ("client", 2.0),
                    ("account name", 1.5),
                    ("account", 1.0),
                    ("company", 0.8),
                ],
            ),
            keywords(
                Intent::Creator,
                &[
                    ("created by", 2.0),
                    ("creator", 1.5),
                    ("author", 1.0),
                    ("by", 0.5),
                    ("user", 1.0),
                    ("owner", 0.8),
                ],
            ),
            keywords(
                Intent::Help,
                &[
                    ("help", 2.0),
                    ("how to", 2.0),
                    ("how do i", 2.0),
                    ("steps to", 1.5),
                    ("guide", 1.0),
                    ("create", 1.0),
                ],
            ),
            keywords(
                Intent::Parts,
                &[
                    ("part", 1.5),
                    ("parts", 1.5),
                    ("component", 1.0),
                    ("components", 1.0),
                    ("datasheet", 1.5),
                    ("specifications", 1.0),
                    ("specs", 1.0),
                    ("inventory", 1.0),
                    ("lead time", 1.0),
                    ("price", 0.8),
                ],
            ),
            keywords(
                Intent::Contract,
                &[
                    ("contract", 1.0),
                    ("contracts", 1.0),
                    ("award", 1.0),
                    ("agreement", 1.0),
                    ("show", 0.5),
                    ("list", 0.5),
                    ("pull", 0.5),
                    ("get", 0.3),
                    ("find", 0.5),
                    ("details", 0.5),
                    ("info", 0.5),
                ],
            ),
        ];

        Self {
            version: "builtin-1".to_string(),
            max_query_length: 500,
            misspellings,
            intents,
            status_words: strings(&[
                "active",
                "expired",
                "inactive",
                "pending",
                "draft",
                "cancelled",
                "canceled",
                "terminated",
                "suspended",
                "approved",
                "expiring",
            ]),
            stop_words: strings(&[
                "a", "an", "the", "and", "or", "with", "for", "in", "on", "at", "of", "to", "after",
                "before", "between", "since", "until", "from", "that", "which", "where", "who",
                "whose", "this", "it", "me", "us", "them", "him", "her", "is", "are", "was",
                "were", "has", "have", "status", "created", "by", "contract", "contracts", "part",
                "parts", "customer", "client", "account", "number", "id", "name", "date", "year",
                "month", "user", "default", "show", "list",
            ]),
            company_names: strings(&[
                "lockheed martin",
                "northrop grumman",
                "general dynamics",
                "general electric",
                "bae systems",
                "boeing",
                "raytheon",
                "honeywell",
                "siemens",
                "airbus",
                "textron",
                "l3harris",
            ]),
            company_suffixes: strings(&[
                "inc",
                "llc",
                "corp",
                "corporation",
                "ltd",
                "limited",
                "co",
                "company",
                "gmbh",
                "plc",
            ]),
            parts_keywords: strings(&[
                "part",
                "parts",
                "component",
                "components",
                "datasheet",
                "specifications",
                "specs",
                "inventory",
                "lead time",
            ]),
            creation_keywords: strings(&[
                "create",
                "creating",
                "created",
                "add",
                "adding",
                "added",
                "generate",
                "generating",
                "generated",
                "make",
                "build",
                "insert",
                "register",
                "load",
                "loading",
                "loaded",
                "upload",
            ]),
            past_tense_verbs: strings(&["created", "added", "generated", "loaded"]),
            attribution_markers: strings(&["by", "in", "after", "before", "on", "during"]),
            query_verbs: strings(&[
                "show", "list", "what", "how", "status", "loaded", "why", "which", "when",
                "where", "who", "display", "find", "pull", "get", "view", "fetch",
            ]),
            help_phrases: strings(&[
                "help",
                "how do i",
                "how to",
                "how can i",
                "steps to",
                "guide",
            ]),
            back_references: strings(&["this", "that", "it", "its", "same"]),
            suggestions: strings(&[
                "show contract 123456",
                "parts for contract 123456",
                "contracts created by vinod after 2020",
                "active contracts for customer Boeing",
                "how do I create a contract",
            ]),
        }
    }
}

/// Regular expressions shared by the extraction stages.
#[derive(Debug)]
pub(crate) struct Patterns {
    pub(crate) word_with_id: Regex,
    pub(crate) contract_number: Regex,
    pub(crate) long_digits: Regex,
    pub(crate) six_digits: Regex,
    pub(crate) part_context: Regex,
    pub(crate) part_shape: Regex,
    pub(crate) id_keyword_before: Regex,
    pub(crate) customer_keyword: Regex,
    pub(crate) company_name: Option<Regex>,
    pub(crate) company_suffix: Option<Regex>,
    pub(crate) created_by: Regex,
    pub(crate) by_word: Regex,
    pub(crate) sort_verb_before: Regex,
    pub(crate) status: Option<Regex>,
    pub(crate) after: Regex,
    pub(crate) before: Regex,
    pub(crate) between: Regex,
    pub(crate) year: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("invalid pattern `{pattern}`"))
}

/// `(?:a|b|c)` over the escaped entries, longest first so that multi-word
/// entries win over their prefixes.
fn alternation(entries: &[String]) -> Option<String> {
    let mut entries: Vec<&str> = entries
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if entries.is_empty() {
        return None;
    }
    entries.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let body = entries
        .iter()
        .map(|e| regex::escape(e).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Some(format!("(?:{body})"))
}

impl Patterns {
    fn new(rules: &RuleSet) -> Result<Self> {
        let company_name = alternation(&rules.company_names)
            .map(|alt| compile(&format!(r"(?i)\b{alt}\b")))
            .transpose()?;
        let company_suffix = alternation(&rules.company_suffixes)
            .map(|alt| {
                compile(&format!(
                    r"\b((?:[A-Z][A-Za-z0-9&'-]*\s+){{1,3}}(?i:{alt}))\b"
                ))
            })
            .transpose()?;
        let status = alternation(&rules.status_words)
            .map(|alt| compile(&format!(r"(?i)\b({alt})\b")))
            .transpose()?;

        Ok(Self {
            word_with_id: compile(r"^([a-z]+)([0-9]+)$")?,
            contract_number: compile(
                r"(?i)\b(?:contracts?|awards?|agreements?)(?:\s*(?:number|num|no\.?|id|#))?\s*[:#]?\s*([0-9]{5,})\b",
            )?,
            long_digits: compile(r"\b[0-9]{7,}\b")?,
            six_digits: compile(r"\b[0-9]{6}\b")?,
            part_context: compile(
                r"(?i)\b(?:parts?(?:\s*(?:number|num|no\.?|#))?|(?:specifications|specs|datasheet)\s+(?:of|for))\s*[:#]?\s*([a-z0-9][a-z0-9-]*)",
            )?,
            part_shape: compile(r"(?i)\b([a-z]{2}[0-9]{3,6})\b")?,
            id_keyword_before: compile(
                r"(?i)\b(?:contracts?|awards?|agreements?|accounts?)(?:\s*(?:number|num|no\.?|id|#))?\s*[:#]?\s*$",
            )?,
            customer_keyword: compile(
                r"(?i)\b(?:customer|client|account\s+name)(?:\s+name)?\b(?:\s+(?:is|called|named))?\s*[:=]?",
            )?,
            company_name,
            company_suffix,
            created_by: compile(r"(?i)\bcreated\s+by\s+([a-z][a-z0-9_'-]*)")?,
            by_word: compile(r"(?i)\bby\s+([a-z][a-z0-9_'-]*)\s*[.?!]?\s*$")?,
            sort_verb_before: compile(
                r"(?i)\b(?:sort|sorted|order|ordered|group|grouped|rank|ranked|arranged)\s+$",
            )?,
            status,
            after: compile(&format!(r"(?i)\b(?:after|since)\s+{DATE}\b"))?,
            before: compile(&format!(r"(?i)\b(?:before|until|prior\s+to)\s+{DATE}\b"))?,
            between: compile(&format!(
                r"(?i)\b(?:between|from)\s+{DATE}\s+(?:and|to|through)\s+{DATE}\b"
            ))?,
            year: compile(r"\b((?:19|20)[0-9]{2})(-[0-9]{2}-[0-9]{2})?\b")?,
        })
    }
}

/// Validated, compiled, read-only rule tables.
#[derive(Debug)]
pub struct RuleTables {
    rules: RuleSet,
    stop_words: HashSet<String>,
    status_words: HashSet<String>,
    company_words: HashSet<String>,
    patterns: Patterns,
}

impl RuleTables {
    pub fn new(rules: RuleSet) -> Result<Self> {
        for (key, correction) in &rules.misspellings {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                bail!("misspelling key `{key}` must be lowercase alphanumeric");
            }
            if correction.trim().is_empty() {
                bail!("misspelling `{key}` has an empty correction");
            }
            if rules.misspellings.contains_key(&correction.to_lowercase()) {
                bail!("correction `{correction}` for `{key}` is itself a misspelling key");
            }
        }
        for table in &rules.intents {
            if let Some(bad) = table.keywords.iter().find(|k| k.weight <= 0.0) {
                bail!(
                    "keyword `{}` of intent `{}` must have a positive weight",
                    bad.phrase,
                    table.intent.as_str()
                );
            }
        }

        let lower_set = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.trim().to_lowercase()).collect()
        };
        let mut company_words = lower_set(&rules.company_suffixes);
        company_words.extend(
            rules
                .company_names
                .iter()
                .flat_map(|name| name.split_whitespace())
                .map(str::to_lowercase),
        );

        let patterns = Patterns::new(&rules)?;
        Ok(Self {
            stop_words: lower_set(&rules.stop_words),
            status_words: lower_set(&rules.status_words),
            company_words,
            patterns,
            rules,
        })
    }

    /// Tables built from the compiled-in defaults.
    pub fn builtin() -> Result<Self> {
        Self::new(RuleSet::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::new(RuleSet::from_file(path)?)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn version(&self) -> &str {
        &self.rules.version
    }

    pub(crate) fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    pub fn correction_for(&self, key: &str) -> Option<&str> {
        self.rules.misspellings.get(key).map(String::as_str)
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(&word.to_lowercase())
    }

    pub fn is_status_word(&self, word: &str) -> bool {
        self.status_words.contains(&word.to_lowercase())
    }

    /// True for words that belong to a company name or are a company suffix.
    pub fn is_company_word(&self, word: &str) -> bool {
        self.company_words.contains(&word.to_lowercase())
    }
}
