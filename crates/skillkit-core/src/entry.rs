use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    ConfigTree,
    DocsTree,
    LicenseFile,
    Readme,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigTree => "config",
            Self::DocsTree => "docs",
            Self::LicenseFile => "license",
            Self::Readme => "readme",
        }
    }
}

/// One top-level path under the target that the installer owns.
///
/// `source_name` is the entry's name inside the fetched tree and
/// `dest_name` its name under the target root.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct ManagedEntry {
    pub kind: EntryKind,
    pub source_name: &'static str,
    pub dest_name: &'static str,
    pub required: bool,
}

impl ManagedEntry {
    pub fn is_renamed(&self) -> bool {
        self.source_name != self.dest_name
    }
}

const MANAGED_ENTRIES: [ManagedEntry; 4] = [
    ManagedEntry {
        kind: EntryKind::ConfigTree,
        source_name: ".claude",
        dest_name: ".claude",
        required: true,
    },
    ManagedEntry {
        kind: EntryKind::DocsTree,
        source_name: "docs",
        dest_name: "docs",
        required: false,
    },
    ManagedEntry {
        kind: EntryKind::LicenseFile,
        source_name: "LICENSE",
        dest_name: "LICENSE",
        required: false,
    },
    // Renamed so a project's own README.md is never displaced.
    ManagedEntry {
        kind: EntryKind::Readme,
        source_name: "README.md",
        dest_name: "SKILLKIT_README.md",
        required: false,
    },
];

/// The managed entries in processing order. Backup and install walk this
/// slice front to back; rollback walks the resulting log back to front.
pub fn managed_entries() -> &'static [ManagedEntry] {
    &MANAGED_ENTRIES
}
