//! Target architectures a sysroot can carry.

use std::fmt;
use std::io;
use std::str::FromStr;

/// A Windows target architecture.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Arch {
    X86,
    X64,
    Arm,
    Arm64,
    Arm64ec,
}

impl Arch {
    /// The directory name used by the SDK and MSVC layouts.
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Arm64ec => "arm64ec",
        }
    }

    /// The Visual Studio component carrying this architecture's compiler
    /// toolset. x86 and x64 ship combined.
    pub fn tools_component(self) -> &'static str {
        match self {
            Arch::X86 | Arch::X64 => {
                "Microsoft.VisualStudio.Component.VC.Tools.x86.x64"
            }
            Arch::Arm => "Microsoft.VisualStudio.Component.VC.Tools.ARM",
            Arch::Arm64 => "Microsoft.VisualStudio.Component.VC.Tools.ARM64",
            Arch::Arm64ec => {
                "Microsoft.VisualStudio.Component.VC.Tools.ARM64EC"
            }
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Arch, io::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86" => Ok(Arch::X86),
            "x64" => Ok(Arch::X64),
            "arm" => Ok(Arch::Arm),
            "arm64" => Ok(Arch::Arm64),
            "arm64ec" => Ok(Arch::Arm64ec),
            _ => invalid_input!(
                "Unknown architecture {:?} (supported: x86, x64, arm, \
                 arm64, arm64ec)",
                s
            ),
        }
    }
}

/// Parses a comma-separated architecture list, dropping duplicates.
pub fn parse_arch_list(list: &str) -> io::Result<Vec<Arch>> {
    let mut arches = Vec::new();
    for part in list.split(',') {
        let arch: Arch = part.parse()?;
        if !arches.contains(&arch) {
            arches.push(arch);
        }
    }
    Ok(arches)
}

/// Returns true when `dir` names one of the requested architectures.
/// Payload directory names vary in case.
pub fn contains_arch(arches: &[Arch], dir: &str) -> bool {
    arches.iter().any(|arch| arch.as_str().eq_ignore_ascii_case(dir))
}
