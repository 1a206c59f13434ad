use dog_queuectl::{Job, JobState, QueueStatus};

pub(crate) fn status_table(status: &QueueStatus) -> String {
    let mut rows: Vec<[String; 2]> = JobState::ALL
        .iter()
        .map(|state| [capitalize(state.name()), status.count(*state).to_string()])
        .collect();
    rows.push(["Total".to_string(), status.total().to_string()]);

    let mut out = table(["State", "Count"], &rows);
    out.push_str(&format!("\nActive workers: {}\n", status.active_workers));
    out
}

pub(crate) fn job_table(state: JobState, jobs: &[Job]) -> String {
    let mut out = format!("Jobs: {} ({})\n", capitalize(state.name()), jobs.len());
    if jobs.is_empty() {
        out.push_str("No jobs found in this state.\n");
        return out;
    }

    let rows: Vec<[String; 5]> = jobs
        .iter()
        .map(|job| {
            [
                job.id.to_string(),
                job.command.clone(),
                job.updated_at.to_rfc3339(),
                format!("{}/{}", job.attempts, job.max_retries),
                job.last_error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    out.push_str(&table(["ID", "Command", "Updated At", "Attempts", "Last Error"], &rows));
    out
}

fn table<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let rule: Vec<&str> = rule.iter().map(String::as_str).collect();

    let mut out = line(&header);
    out.push_str(&line(&rule));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
