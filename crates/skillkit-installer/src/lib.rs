mod backups;
mod journal;
mod post_install;
mod report;
mod transaction;

pub use backups::{list_backups, plan, BackupSet, PlannedAction, PlannedChange};
pub use journal::{choose_backup_suffix, BackupRecord, JournalStep, TransactionLog};
pub use post_install::{
    install_hook_dependencies, mark_hooks_executable, run_post_install, PostInstallOptions,
};
pub use report::{count_contents, ContentCounts, InstallReport, InstalledEntry};
pub use transaction::{
    backup, install, rollback, run, stage, validate_target, InstallObserver, NoopObserver, Phase,
    RollbackSummary, RunOptions,
};
