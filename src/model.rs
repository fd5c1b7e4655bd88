//! Wire-level and in-process data model: [`Attempt`], [`TestCase`], [`Language`],
//! and the outbound [`Verdict`].

use serde::{Deserialize, Serialize};

/// The programming language tag of a submission.
///
/// Renames are mandatory, not cosmetic: several of the wire strings
/// (`"C++"`, `"C#"`) are not valid Rust identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "Python")]
    Python,
    #[serde(rename = "JavaScript")]
    JavaScript,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C++")]
    Cpp,
    #[serde(rename = "Rust")]
    Rust,
    #[serde(rename = "Go")]
    Go,
    #[serde(rename = "Java")]
    Java,
    #[serde(rename = "Kotlin")]
    Kotlin,
    #[serde(rename = "C#")]
    CSharp,
}

/// One input/expected-output pair. Both sides are ordered sequences of
/// lines, matching the wire format's `[[input_line, ...], [expected_line, ...]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: Vec<String>,
    pub expected_output: Vec<String>,
}

/// `tests` arrives over the wire as `[[input_lines, expected_lines], ...]`
/// rather than `[{input: ..., expected_output: ...}, ...]`; this newtype
/// carries the (de)serialization so [`TestCase`] itself stays a normal
/// named-field struct everywhere else in the crate.
impl Serialize for RawTestCase {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (&self.0.input, &self.0.expected_output).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawTestCase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (input, expected_output) = <(Vec<String>, Vec<String>)>::deserialize(deserializer)?;
        Ok(RawTestCase(TestCase {
            input,
            expected_output,
        }))
    }
}

/// Serde adapter between the wire tuple form and [`TestCase`].
#[derive(Debug, Clone)]
pub struct RawTestCase(pub TestCase);

/// The work unit: a stable identifier, a target language, source code, per-run
/// limits, and an ordered sequence of test cases. Immutable for the duration
/// of execution.
#[derive(Debug, Clone, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub programming_language: Language,
    pub source_code: String,
    pub time_limit_seconds: u32,
    pub memory_limit_megabytes: u32,
    #[serde(deserialize_with = "deserialize_tests")]
    pub tests: Vec<TestCase>,
}

fn deserialize_tests<'de, D>(deserializer: D) -> Result<Vec<TestCase>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<RawTestCase>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|r| r.0).collect())
}

/// Final classification of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    #[serde(rename = "Ok")]
    Ok,
    #[serde(rename = "Wrong answer")]
    WrongAnswer,
    #[serde(rename = "Compilation error")]
    CompilationError,
    #[serde(rename = "Run-time error")]
    RuntimeError,
    #[serde(rename = "Time-limit exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory limit exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Output limit exceeded")]
    OutputLimitExceeded,
}

/// What gets published back to `execution_results`.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub id: i64,
    pub status: ExecutionStatus,
    pub time_used_ms: Option<u64>,
    pub memory_used_bytes: Option<u64>,
    pub error_traceback: Option<String>,
    pub failed_test_number: Option<u32>,
    pub source_code_output: Option<String>,
    pub expected_output: Option<String>,
}

impl Verdict {
    /// An `OK` verdict carrying the maxima across all tests.
    pub fn ok(id: i64, max_elapsed_secs: f64, max_peak_mb: f64) -> Self {
        Verdict {
            id,
            status: ExecutionStatus::Ok,
            time_used_ms: Some((max_elapsed_secs * 1000.0).floor() as u64),
            memory_used_bytes: Some((max_peak_mb * 1024.0 * 1024.0).floor() as u64),
            error_traceback: None,
            failed_test_number: None,
            source_code_output: None,
            expected_output: None,
        }
    }

    /// A non-`OK` verdict produced by a single failing test or compilation.
    pub fn failed(id: i64, status: ExecutionStatus) -> Self {
        Verdict {
            id,
            status,
            time_used_ms: None,
            memory_used_bytes: None,
            error_traceback: None,
            failed_test_number: None,
            source_code_output: None,
            expected_output: None,
        }
    }

    pub fn with_failed_test(mut self, n: u32) -> Self {
        self.failed_test_number = Some(n);
        self
    }

    pub fn with_error(mut self, text: impl Into<String>) -> Self {
        self.error_traceback = Some(text.into());
        self
    }

    pub fn with_outputs(mut self, actual: impl Into<String>, expected: impl Into<String>) -> Self {
        self.source_code_output = Some(actual.into());
        self.expected_output = Some(expected.into());
        self
    }

    /// Synthesized when the executor pipeline itself failed unexpectedly
    /// (panic, I/O error, profile miss) rather than classifying a real run.
    pub fn synthesized_runtime_error(id: i64) -> Self {
        Verdict::failed(id, ExecutionStatus::RuntimeError)
    }
}
