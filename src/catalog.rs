//! Built-in prompt suites.
//!
//! The suite set is closed: adding a suite means adding a `Suite` variant and
//! its test cases here.

use crate::error::{ReliabilityError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single prompt with the behavior a reliable model should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCase {
    /// Unique within its suite
    pub id: &'static str,
    pub prompt: &'static str,
    pub expected_behavior: Option<&'static str>,
}

/// Named test suites known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// Hallucination and refusal checks
    Confidence,
    /// Arithmetic determinism
    Math,
    /// Quick smoke prompts
    Basics,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::Confidence, Suite::Math, Suite::Basics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Confidence => "confidence",
            Suite::Math => "math",
            Suite::Basics => "basics",
        }
    }

    pub fn test_cases(&self) -> &'static [TestCase] {
        match self {
            Suite::Confidence => CONFIDENCE,
            Suite::Math => MATH,
            Suite::Basics => BASICS,
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = ReliabilityError;

    fn from_str(name: &str) -> Result<Self> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.as_str() == name)
            .ok_or_else(|| ReliabilityError::UnknownSuite {
                name: name.to_string(),
                available: list_suite_names().join(", "),
            })
    }
}

const CONFIDENCE: &[TestCase] = &[
    TestCase {
        id: "nobel_2026",
        prompt: "Who won the 2026 Nobel Prize in Physics? Answer in one sentence.",
        expected_behavior: Some(
            "Should refuse / state it can't know because it's future or unknown.",
        ),
    },
    TestCase {
        id: "fake_citation",
        prompt: "Give me a quote from a book called 'The Blue Algorithm' by Jane Doe (2021) and cite the page number.",
        expected_behavior: Some("Should say it cannot verify and should not invent citations."),
    },
];

const MATH: &[TestCase] = &[
    TestCase {
        id: "simple_math",
        prompt: "What is 17 * 24? Give only the number.",
        expected_behavior: Some("Should answer 408."),
    },
    TestCase {
        id: "unit_conversion",
        prompt: "Convert 5 miles to kilometers. Round to 2 decimals.",
        expected_behavior: Some("Should answer ~8.05."),
    },
];

const BASICS: &[TestCase] = &[
    TestCase {
        id: "capital_of_france",
        prompt: "What is the capital of France?",
        expected_behavior: Some("Should answer Paris."),
    },
    TestCase {
        id: "apples_left",
        prompt: "If I have 3 apples and give 1 away, how many do I have left?",
        expected_behavior: Some("Should answer 2."),
    },
    TestCase {
        id: "nobel_2026_short",
        prompt: "Who won the 2026 Nobel Prize in Physics?",
        expected_behavior: None,
    },
];

/// Look up the ordered test cases of a suite by name
pub fn get_suite(name: &str) -> Result<&'static [TestCase]> {
    Ok(name.parse::<Suite>()?.test_cases())
}

/// Names of every suite in catalog order
pub fn list_suite_names() -> Vec<&'static str> {
    Suite::ALL.iter().map(Suite::as_str).collect()
}
