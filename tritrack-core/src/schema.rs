//! Board schema: platforms, phases and the status vocabulary of each phase.
//!
//! Everything that walks the status grid iterates [`PHASES`] × [`PLATFORMS`],
//! so adding a platform or a phase only requires touching this file.

/// A delivery platform (one column group per phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub key: &'static str,
    pub label: &'static str,
}

/// A delivery phase with its ordered status options
///
/// The first option is the default value of every cell in the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub key: &'static str,
    pub label: &'static str,
    pub options: &'static [&'static str],
}

impl Phase {
    /// Returns the default status value for this phase
    pub fn default_value(&self) -> &'static str {
        self.options[0]
    }

    /// Returns true if `value` belongs to this phase's vocabulary
    pub fn allows(&self, value: &str) -> bool {
        self.options.contains(&value)
    }
}

/// Shared "not needed" option available in every phase
pub const NOT_NEEDED: &str = "无需";

pub const PLATFORMS: &[Platform] = &[
    Platform {
        key: "android",
        label: "安卓",
    },
    Platform {
        key: "ios",
        label: "iOS",
    },
    Platform {
        key: "harmony",
        label: "鸿蒙",
    },
];

pub const PHASES: &[Phase] = &[
    Phase {
        key: "development",
        label: "开发阶段",
        options: &["未开发", "开发中", "排队中", "已完成", NOT_NEEDED],
    },
    Phase {
        key: "testing",
        label: "测试阶段",
        options: &["未送测", "已送测", "已出报告", NOT_NEEDED],
    },
    Phase {
        key: "production",
        label: "投产阶段",
        options: &["未发起", "审批中", "已批待投产", "已投产", NOT_NEEDED],
    },
];

/// Owners offered by the board's picker. Advisory only: the normalizer and
/// the tracker accept any owner string.
pub const OWNER_OPTIONS: &[&str] = &["", "黄华宏", "黄志豪", "陈嘉敏", "陈成", "龙波", "曾祥锋"];

// Placeholder names
pub const UNNAMED_WORKSPACE: &str = "未命名工作空间";
pub const DEFAULT_WORKSPACE: &str = "默认工作空间";
pub const IMPORTED_WORKSPACE: &str = "导入工作空间";
pub const WORKSPACE_FILE_STEM: &str = "工作空间";

/// Positional workspace name, `index` is 1-based
pub fn numbered_workspace_name(index: usize) -> String {
    format!("{} {}", WORKSPACE_FILE_STEM, index)
}

/// Looks up a phase by key
pub fn phase(key: &str) -> Option<&'static Phase> {
    PHASES.iter().find(|p| p.key == key)
}

/// Looks up a platform by key
pub fn platform(key: &str) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|p| p.key == key)
}

/// Returns true if `owner` is one of the picker entries
pub fn is_known_owner(owner: &str) -> bool {
    OWNER_OPTIONS.contains(&owner)
}
