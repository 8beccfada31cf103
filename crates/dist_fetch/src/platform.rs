use std::fmt;

use crate::ArchiveFormat;

/// The operating system and architecture a release archive is built for,
/// spelled the way the distribution names them (`linux-amd64`,
/// `darwin-arm64`, `windows-386`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(
            dist_os(std::env::consts::OS),
            dist_arch(std::env::consts::ARCH, cfg!(target_endian = "little")),
        )
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// The `<os>-<arch>` part of archive names.
    pub fn tag(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Windows releases ship as zip, everything else as gzipped tar.
    pub fn archive_format(&self) -> ArchiveFormat {
        if self.is_windows() {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }

    /// The file name of an executable called `name` on this platform.
    pub fn exe_name(&self, name: &str) -> String {
        if self.is_windows() && !name.ends_with(".exe") {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }
}

/// Maps a Rust target OS to the name releases are published under. The C
/// library does not matter, musl builds use the `linux` archives.
fn dist_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Maps a Rust target architecture to the name releases are published under.
fn dist_arch(arch: &str, little_endian: bool) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" if little_endian => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
