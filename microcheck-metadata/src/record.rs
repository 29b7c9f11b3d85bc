// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::UnknownOperatingSystem;
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, collections::BTreeMap, fmt, str::FromStr};

/// The separator between an operating-system scheme and the rest of a test name.
const SCHEME_SEPARATOR: &str = "://";

/// A bare build-system identifier, e.g. `//python/ray/tests:test_basic`.
///
/// Targets never carry an operating-system scheme. They are the unit that is ultimately scheduled
/// for execution.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Creates a new `Target` from a bare identifier.
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts this target into its inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Target {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Target {
    fn from(target: &str) -> Self {
        Self(target.to_owned())
    }
}

impl From<String> for Target {
    fn from(target: String) -> Self {
        Self(target)
    }
}

/// An operating system that tests are selected for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    /// Linux. Names without a scheme belong to this operating system.
    #[default]
    Linux,

    /// Windows.
    Windows,
}

impl OperatingSystem {
    /// Returns the string representation of this operating system, as used in test-name schemes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// Returns the scheme prefix for this operating system, e.g. `linux://`.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Linux => "linux://",
            Self::Windows => "windows://",
        }
    }

    /// Returns the known operating system names.
    pub fn variants() -> &'static [&'static str] {
        &["linux", "windows"]
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingSystem {
    type Err = UnknownOperatingSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            other => Err(UnknownOperatingSystem::new(other)),
        }
    }
}

/// A test name split into its optional operating-system scheme and its bare target.
///
/// Names look like `[<os>://]//path:name`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScopedName<'a> {
    scheme: Option<&'a str>,
    rest: &'a str,
}

impl<'a> ScopedName<'a> {
    /// Splits a name into its scheme and bare target.
    pub fn parse(name: &'a str) -> Self {
        if name.starts_with("//") {
            return Self {
                scheme: None,
                rest: name,
            };
        }
        match name.split_once(SCHEME_SEPARATOR) {
            // The bare target keeps its leading "//": "linux://pkg:t" -> "//pkg:t".
            Some((scheme, _)) if !scheme.is_empty() => Self {
                scheme: Some(scheme),
                rest: &name[scheme.len() + 1..],
            },
            _ => Self {
                scheme: None,
                rest: name,
            },
        }
    }

    /// Returns the scheme (e.g. `windows`), if one was present.
    pub fn scheme(&self) -> Option<&'a str> {
        self.scheme
    }

    /// Returns the operating system this name belongs to.
    ///
    /// Names without a scheme belong to the default operating system.
    pub fn operating_system(&self) -> Result<OperatingSystem, UnknownOperatingSystem> {
        match self.scheme {
            Some(scheme) => scheme.parse(),
            None => Ok(OperatingSystem::default()),
        }
    }

    /// Returns true if this name belongs to the given operating system.
    ///
    /// Unknown schemes never match.
    pub fn is_on(&self, os: OperatingSystem) -> bool {
        self.operating_system().is_ok_and(|this_os| this_os == os)
    }

    /// Returns the bare target, with the scheme stripped.
    pub fn target(&self) -> Target {
        Target::new(self.rest)
    }
}

/// The lifecycle state of a test, as tracked by the metadata store.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    /// The test passes consistently.
    Passing,

    /// The test failed recently.
    Failing,

    /// The test has failed across several consecutive runs.
    ConsistentlyFailing,

    /// The test passes and fails nondeterministically.
    Flaky,

    /// The test was jailed and is not expected to run.
    Jailed,

    /// A state this version of microcheck doesn't know about.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Metadata for a single test, fetched from the test metadata store.
///
/// Records are immutable for the duration of a selection run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// The fully-qualified name, including the operating-system scheme, e.g.
    /// `linux://python/ray/tests:test_basic`.
    pub name: String,

    /// The team that owns this test.
    #[serde(default)]
    pub team: String,

    /// The lifecycle state of this test.
    #[serde(default)]
    pub state: TestState,

    /// Any other properties attached to this record.
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl TestRecord {
    /// The property key that marks a test as high impact.
    pub const IS_HIGH_IMPACT: &'static str = "is_high_impact";

    /// Creates a new record with no extra properties.
    pub fn new(name: impl Into<String>, team: impl Into<String>, state: TestState) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
            state,
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property on this record, returning the updated record.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns this record's name split into scheme and target.
    pub fn scoped_name(&self) -> ScopedName<'_> {
        ScopedName::parse(&self.name)
    }

    /// Returns the bare target for this record.
    pub fn target(&self) -> Target {
        self.scoped_name().target()
    }

    /// Returns true if the store flags this test as high impact.
    ///
    /// The store writes this flag as the string `"true"`; a JSON boolean is accepted as well.
    pub fn is_high_impact(&self) -> bool {
        match self.properties.get(Self::IS_HIGH_IMPACT) {
            Some(serde_json::Value::String(s)) => s == "true",
            Some(serde_json::Value::Bool(b)) => *b,
            _ => false,
        }
    }
}
