//! Human-readable status report.

use rmsched::TaskInfo;

/// Render one block per registered task, in registration order.
///
/// ```text
/// Process # 1 details:
/// PID:1234
/// P:100
/// C:20
/// ```
///
/// Periods and budgets are whole milliseconds.
#[must_use]
pub fn format_status(tasks: &[TaskInfo]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            format!(
                "Process # {} details:\nPID:{}\nP:{}\nC:{}\n",
                i + 1,
                task.task_id,
                task.period.as_millis(),
                task.budget.as_millis()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmsched::TaskId;
    use std::time::Duration;

    #[test]
    fn test_empty_report() {
        assert_eq!(format_status(&[]), "");
    }

    #[test]
    fn test_numbering_starts_at_one() {
        let tasks = [
            TaskInfo {
                task_id: TaskId::new(10),
                period: Duration::from_millis(100),
                budget: Duration::from_millis(20),
            },
            TaskInfo {
                task_id: TaskId::new(11),
                period: Duration::from_millis(50),
                budget: Duration::from_millis(5),
            },
        ];
        let report = format_status(&tasks);
        assert!(report.starts_with("Process # 1 details:\nPID:10\nP:100\nC:20\n"));
        assert!(report.contains("Process # 2 details:\nPID:11\n"));
    }
}
