// Presentation: turns board snapshots into terminal or JSON output.

pub mod report;
