//! Language Profile Registry.
//!
//! A closed, compile-time table mapping a [`Language`] to its source file
//! extension, optional compile command template, and run command template.
//! Templates are token slices; placeholders (`{file}`, `{exe}`, `{workdir}`,
//! `{memory}`) are substituted literally by [`Profile::expand`] — never
//! handed to a shell.

use crate::model::Language;

/// Compilation memory budget (MiB) for memory-hungry toolchains (Java, Kotlin).
pub const COMPILATION_MEMORY_MB: u32 = 2048;
/// Fixed compile deadline, independent of the attempt's own time limit.
pub const COMPILATION_TIME_LIMIT_SECS: u32 = 60;

/// Static toolchain configuration for one language.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Source file extension, including the leading dot (e.g. `.py`).
    pub ext: &'static str,
    /// `None` for interpreted languages that need no compile step.
    pub compile: Option<&'static [&'static str]>,
    pub run: &'static [&'static str],
    /// Java requires the source file to be named `Main.<ext>`; every other
    /// language accepts any stem and uses `main.<ext>`.
    pub fixed_stem: Option<&'static str>,
}

impl Profile {
    /// The filename the source code must be written under inside the workspace.
    pub fn source_filename(&self) -> String {
        format!("{}{}", self.fixed_stem.unwrap_or("main"), self.ext)
    }

    /// Expand a command template against workspace paths and the attempt's
    /// memory budget. Tokens are substituted literally; no shell is invoked.
    pub fn expand_run(&self, file: &str, exe: &str, workdir: &str, memory_mb: u32) -> Vec<String> {
        expand_template(self.run, file, exe, workdir, memory_mb)
    }

    pub fn expand_compile(
        &self,
        file: &str,
        exe: &str,
        workdir: &str,
        memory_mb: u32,
    ) -> Option<Vec<String>> {
        self.compile
            .map(|tpl| expand_template(tpl, file, exe, workdir, memory_mb))
    }
}

fn expand_template(
    template: &[&'static str],
    file: &str,
    exe: &str,
    workdir: &str,
    memory_mb: u32,
) -> Vec<String> {
    template
        .iter()
        .map(|tok| {
            tok.replace("{file}", file)
                .replace("{exe}", exe)
                .replace("{workdir}", workdir)
                .replace("{memory}", &memory_mb.to_string())
        })
        .collect()
}

/// Total over the supported language set. Requesting an unsupported tag is a
/// programmer error in this crate (the wire-level `Language` enum is itself
/// closed and total over these variants), so this never needs to return an
/// error.
pub fn profile_for(language: Language) -> Profile {
    match language {
        Language::Python => Profile {
            ext: ".py",
            compile: None,
            run: &["python3", "{file}"],
            fixed_stem: None,
        },
        Language::JavaScript => Profile {
            ext: ".js",
            compile: None,
            run: &["node", "--max-old-space-size={memory}", "{file}"],
            fixed_stem: None,
        },
        Language::C => Profile {
            ext: ".c",
            compile: Some(&[
                "gcc",
                "{file}",
                "-O0",
                "-pipe",
                "-std=c17",
                "-fsanitize=undefined",
                "-fno-sanitize-recover=undefined",
                "-o",
                "{exe}",
            ]),
            run: &["{exe}"],
            fixed_stem: None,
        },
        Language::Cpp => Profile {
            ext: ".cpp",
            compile: Some(&[
                "g++",
                "-O0",
                "-std=c++17",
                "-fsanitize=undefined",
                "-fno-sanitize-recover=undefined",
                "{file}",
                "-o",
                "{exe}",
            ]),
            run: &["{exe}"],
            fixed_stem: None,
        },
        Language::Rust => Profile {
            ext: ".rs",
            compile: Some(&["rustc", "{file}", "-O", "-o", "{exe}"]),
            run: &["{exe}"],
            fixed_stem: None,
        },
        Language::Go => Profile {
            ext: ".go",
            compile: Some(&["go", "build", "-o", "{exe}", "{file}"]),
            run: &["{exe}"],
            fixed_stem: None,
        },
        Language::Java => Profile {
            ext: ".java",
            compile: Some(&["javac", "{file}"]),
            run: &[
                "java",
                "-XX:+UseSerialGC",
                "-Xmx{memory}m",
                "-cp",
                "{workdir}",
                "-enableassertions",
                "Main",
            ],
            fixed_stem: Some("Main"),
        },
        Language::Kotlin => Profile {
            ext: ".kt",
            compile: Some(&["kotlinc", "{file}", "-include-runtime", "-d", "{exe}.jar"]),
            run: &["java", "-XX:+UseSerialGC", "-Xmx{memory}m", "-jar", "{exe}.jar"],
            fixed_stem: None,
        },
        Language::CSharp => Profile {
            ext: ".cs",
            compile: Some(&["mcs", "{file}", "-optimize+", "-out:{exe}.exe"]),
            run: &["mono", "{exe}.exe"],
            fixed_stem: None,
        },
    }
}

/// Language-specific environment mutations applied before spawn. Data-driven
/// rather than hard-coded in the supervisor.
pub fn env_overrides(language: Language, memory_mb: u32) -> Vec<(String, String)> {
    match language {
        Language::Go => vec![("GOMEMLIMIT".to_string(), format!("{memory_mb}MiB"))],
        Language::Rust => {
            if which_rustc_missing() {
                let home = std::env::var("HOME").unwrap_or_default();
                let cargo_bin = format!("{home}/.cargo/bin");
                let path = std::env::var("PATH").unwrap_or_default();
                vec![("PATH".to_string(), format!("{cargo_bin}:{path}"))]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn which_rustc_missing() -> bool {
    let path = std::env::var_os("PATH").unwrap_or_default();
    !std::env::split_paths(&path).any(|dir| dir.join("rustc").is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_uses_fixed_stem() {
        let p = profile_for(Language::Java);
        assert_eq!(p.source_filename(), "Main.java");
    }

    #[test]
    fn python_uses_default_stem() {
        let p = profile_for(Language::Python);
        assert_eq!(p.source_filename(), "main.py");
        assert!(p.compile.is_none());
    }

    #[test]
    fn template_expansion_substitutes_all_placeholders() {
        let p = profile_for(Language::JavaScript);
        let run = p.expand_run("/w/main.js", "/w/prog", "/w", 256);
        assert_eq!(run, vec!["node", "--max-old-space-size=256", "/w/main.js"]);
    }

    #[test]
    fn java_run_template_carries_memory_and_workdir() {
        let p = profile_for(Language::Java);
        let run = p.expand_run("/w/Main.java", "/w/prog", "/w", 512);
        assert!(run.contains(&"-Xmx512m".to_string()));
        assert!(run.contains(&"/w".to_string()));
        assert!(run.contains(&"Main".to_string()));
    }

    #[test]
    fn go_env_sets_gomemlimit() {
        let env = env_overrides(Language::Go, 128);
        assert_eq!(env, vec![("GOMEMLIMIT".to_string(), "128MiB".to_string())]);
    }
}
