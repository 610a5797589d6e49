//! Per-language compile/run semantics, expressed as a closed set of profile
//! variants rather than a plugin interface: the set of supported languages
//! is small and known ahead of time, so a tagged union is simpler to reason
//! about than dynamic dispatch or dynamically loaded providers.
//!

use sandbox::{AddressSpaceLimit, MemorySize};

/// How a submission in a given language is compiled (if at all) and run.
///
/// The three variants mirror the three families of runtime behavior that
/// matter for sandboxing: a natively compiled binary whose address space is
/// exactly the memory budget, a managed runtime that manages its own heap
/// and must not be constrained by `RLIMIT_AS`, and an interpreter whose own
/// footprint needs a fixed allowance on top of the user's budget.
#[derive(Clone, Debug)]
pub enum LanguageProfile {
    /// Compiled directly to a native executable (e.g. C++).
    Native(NativeProfile),

    /// Compiled to bytecode run by a managed virtual machine (e.g. Java).
    BytecodeVm(BytecodeVmProfile),

    /// Run directly by an interpreter with no separate compile step (e.g.
    /// Python).
    Interpreted(InterpretedProfile),
}

#[derive(Clone, Debug)]
pub struct NativeProfile {
    pub source_ext: &'static str,
    pub compiler: &'static str,
    pub compiler_flags: &'static [&'static str],
}

#[derive(Clone, Debug)]
pub struct BytecodeVmProfile {
    pub main_class: &'static str,
    pub source_ext: &'static str,
    pub compiler: &'static str,
    pub vm: &'static str,
}

#[derive(Clone, Debug)]
pub struct InterpretedProfile {
    pub source_ext: &'static str,
    pub interpreter: &'static str,
    pub interp_overhead_mb: u64,
}

impl LanguageProfile {
    /// Resolve a language tag from a job payload to a concrete profile.
    /// Returns `None` for any tag this worker does not support; the caller
    /// maps that to an `InternalError` outcome rather than treating it as a
    /// crate-level error.
    pub fn resolve(language: &str) -> Option<LanguageProfile> {
        match language {
            "cpp" | "c++" => Some(LanguageProfile::Native(NativeProfile {
                source_ext: "cpp",
                compiler: "g++",
                compiler_flags: &["-O2"],
            })),
            "java" => Some(LanguageProfile::BytecodeVm(BytecodeVmProfile {
                main_class: "Main",
                source_ext: "java",
                compiler: "javac",
                vm: "java",
            })),
            "python" | "python3" => Some(LanguageProfile::Interpreted(InterpretedProfile {
                source_ext: "py",
                interpreter: "python3",
                // Matches the headroom the Python strategy in the reference
                // implementation applies on top of the user's memory budget.
                interp_overhead_mb: 50,
            })),
            _ => None,
        }
    }

    /// Name of the file the source code must be written to before
    /// compiling/running. Bytecode languages require a name matching the
    /// declared class so the compiler accepts it.
    pub fn source_filename(&self, id: &str) -> String {
        match self {
            LanguageProfile::Native(p) => format!("submit_{}.{}", id, p.source_ext),
            LanguageProfile::BytecodeVm(p) => format!("{}.{}", p.main_class, p.source_ext),
            LanguageProfile::Interpreted(p) => format!("submit_{}.{}", id, p.source_ext),
        }
    }

    pub fn needs_compilation(&self) -> bool {
        match self {
            LanguageProfile::Native(_) => true,
            LanguageProfile::BytecodeVm(_) => true,
            LanguageProfile::Interpreted(_) => false,
        }
    }

    /// `argv` of the compile step, or `None` for languages with no compile
    /// step. `argv[0]` is resolved via `PATH`. Stderr is the caller's
    /// responsibility to capture.
    pub fn compile_argv(&self, id: &str) -> Option<Vec<String>> {
        match self {
            LanguageProfile::Native(p) => {
                let mut argv = vec![p.compiler.to_owned()];
                argv.extend(p.compiler_flags.iter().map(|s| s.to_string()));
                argv.push(self.source_filename(id));
                argv.push("-o".to_owned());
                argv.push(format!("bin_{}", id));
                Some(argv)
            }
            LanguageProfile::BytecodeVm(p) => {
                Some(vec![p.compiler.to_owned(), self.source_filename(id)])
            }
            LanguageProfile::Interpreted(_) => None,
        }
    }

    /// `argv` used to run the submission once compiled (or directly, for
    /// interpreted languages).
    pub fn run_argv(&self, id: &str, memory_limit_mb: u64) -> Vec<String> {
        match self {
            LanguageProfile::Native(_) => vec![format!("./bin_{}", id)],
            LanguageProfile::BytecodeVm(p) => vec![
                p.vm.to_owned(),
                format!("-Xmx{}m", memory_limit_mb),
                "-Xms16m".to_owned(),
                "-XX:+UseSerialGC".to_owned(),
                "-Xss64m".to_owned(),
                "-XX:+ExitOnOutOfMemoryError".to_owned(),
                "-cp".to_owned(),
                ".".to_owned(),
                p.main_class.to_owned(),
            ],
            LanguageProfile::Interpreted(p) => {
                vec![p.interpreter.to_owned(), self.source_filename(id)]
            }
        }
    }

    /// `RLIMIT_AS` to install around the run, or `Unlimited` for runtimes
    /// that manage their own heap and would fail to start under a finite
    /// address-space limit.
    pub fn address_space_limit(&self, memory_limit_mb: u64) -> AddressSpaceLimit {
        match self {
            LanguageProfile::Native(_) => {
                AddressSpaceLimit::Bytes(MemorySize::MegaBytes(memory_limit_mb as usize).bytes() as u64)
            }
            LanguageProfile::BytecodeVm(_) => AddressSpaceLimit::Unlimited,
            LanguageProfile::Interpreted(p) => {
                let total_mb = memory_limit_mb + p.interp_overhead_mb;
                AddressSpaceLimit::Bytes(MemorySize::MegaBytes(total_mb as usize).bytes() as u64)
            }
        }
    }

    /// Remove compile artifacts specific to this language. The source file
    /// itself is the judge driver's responsibility, not the profile's.
    pub fn cleanup(&self, id: &str) {
        let path = match self {
            LanguageProfile::Native(_) => format!("bin_{}", id),
            LanguageProfile::BytecodeVm(p) => format!("{}.class", p.main_class),
            LanguageProfile::Interpreted(_) => return,
        };
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox::AddressSpaceLimit;

    #[test]
    fn unknown_language_is_unsupported() {
        assert!(LanguageProfile::resolve("brainfuck").is_none());
    }

    #[test]
    fn native_profile_filenames_and_compile_argv() {
        let p = LanguageProfile::resolve("cpp").unwrap();
        assert_eq!(p.source_filename("42"), "submit_42.cpp");
        assert!(p.needs_compilation());
        let argv = p.compile_argv("42").unwrap();
        assert_eq!(argv[0], "g++");
        assert!(argv.contains(&"submit_42.cpp".to_owned()));
        assert!(argv.contains(&"bin_42".to_owned()));
    }

    #[test]
    fn bytecode_vm_profile_waives_address_space_limit() {
        let p = LanguageProfile::resolve("java").unwrap();
        assert_eq!(p.source_filename("7"), "Main.java");
        match p.address_space_limit(256) {
            AddressSpaceLimit::Unlimited => {}
            _ => panic!("java profile must not install RLIMIT_AS"),
        }
        let run = p.run_argv("7", 256);
        assert!(run.contains(&"-Xmx256m".to_owned()));
    }

    #[test]
    fn interpreted_profile_adds_overhead_to_address_space_limit() {
        let p = LanguageProfile::resolve("python").unwrap();
        assert!(!p.needs_compilation());
        match p.address_space_limit(100) {
            AddressSpaceLimit::Bytes(b) => assert_eq!(b, 150 * 1024 * 1024),
            AddressSpaceLimit::Unlimited => panic!("python must have a finite RLIMIT_AS"),
        }
    }
}
