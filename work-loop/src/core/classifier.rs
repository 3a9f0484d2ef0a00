//! Deterministic classification of task-describer output.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{TaskInfo, TaskStatus};

/// Sentinel printed when every task is done.
pub const ALL_COMPLETED_SENTINEL: &str = "All tasks completed!";
/// Sentinel printed when no task source exists.
pub const NO_TASK_FILES_SENTINEL: &str = "No task file found";

static NEXT_TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)##\s*Next Task:\s*(\d+)").expect("next task regex is valid")
});
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Task\s+(\d+)").expect("task regex is valid"));

/// Classify raw describer output into exactly one [`TaskStatus`].
///
/// The completion sentinel wins over the missing-source sentinel; anything else
/// is an available task.
pub fn classify_task_output(output: &str) -> TaskInfo {
    let status = if output.contains(ALL_COMPLETED_SENTINEL) {
        TaskStatus::AllCompleted
    } else if output.contains(NO_TASK_FILES_SENTINEL) {
        TaskStatus::NoTaskFiles
    } else {
        TaskStatus::Available {
            number: extract_task_number(output),
        }
    };
    TaskInfo {
        status,
        output: output.to_string(),
    }
}

/// Pull a task identifier out of describer output.
///
/// Prefers a `## Next Task: N` heading and falls back to the first `Task N`.
pub fn extract_task_number(output: &str) -> Option<String> {
    [&*NEXT_TASK_RE, &*TASK_RE]
        .into_iter()
        .find_map(|re| re.captures(output))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_sentinel_wins() {
        let info = classify_task_output("## Next Task: 3\nAll tasks completed!\nNo task file found");
        assert_eq!(info.status, TaskStatus::AllCompleted);
    }

    #[test]
    fn missing_source_sentinel() {
        let info = classify_task_output("Error: No task file found in ./tasks");
        assert_eq!(info.status, TaskStatus::NoTaskFiles);
        assert!(info.output.contains("./tasks"));
    }

    #[test]
    fn extracts_heading_number() {
        let info = classify_task_output("Working on Task 9 next\n## Next Task: 5\nDetails");
        assert_eq!(info.number(), Some("5"));
    }

    #[test]
    fn heading_match_is_case_insensitive() {
        assert_eq!(extract_task_number("##next task:12"), Some("12".to_string()));
    }

    #[test]
    fn falls_back_to_task_mention() {
        assert_eq!(
            extract_task_number("Selected task   42 for today"),
            Some("42".to_string())
        );
    }

    #[test]
    fn available_without_number() {
        let info = classify_task_output("There is more work to do");
        assert_eq!(info.status, TaskStatus::Available { number: None });
    }
}
