use crate::infra::{
    build_backend, parse_date, seed_demo_roster, DemoRoster, MemoryService, SeededUser,
};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::Args;
use cleaning_ops::config::SchedulingConfig;
use cleaning_ops::error::AppError;
use cleaning_ops::scheduling::{
    CleaningId, CleaningPatch, CleaningStatus, FeedError, LiveView, NewCleaning, ProfileId,
    SchedulingError, Session, ViewChange,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Day to schedule the demo cleaning on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Number of steps in the cleaning checklist (1-20)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub(crate) total_steps: u32,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            date: None,
            total_steps: 5,
        }
    }
}

fn session(user: &SeededUser) -> Session {
    Session::bearer(user.token.clone())
}

fn step(value: u32) -> CleaningPatch {
    CleaningPatch {
        current_step: Some(i64::from(value)),
        ..CleaningPatch::default()
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { date, total_steps } = args;
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let backend = build_backend(&SchedulingConfig::default());
    let roster = seed_demo_roster(&backend)?;
    let service = backend.service.as_ref();

    let admin = session(&roster.admin);
    let client = roster
        .clients
        .first()
        .ok_or_else(|| SchedulingError::not_found("client", "demo roster"))?;
    let sam = roster
        .cleaners
        .first()
        .ok_or_else(|| SchedulingError::not_found("cleaner", "demo roster"))?;
    let lee = roster
        .cleaners
        .get(1)
        .ok_or_else(|| SchedulingError::not_found("cleaner", "demo roster"))?;

    println!("Cleaning scheduler demo");

    let house = service
        .list_houses(&session(client))?
        .into_iter()
        .next()
        .ok_or_else(|| SchedulingError::not_found("house", client.id()))?;

    let record = service.create_cleaning(
        &admin,
        NewCleaning {
            client_id: Some(client.id()),
            house_id: Some(house.id),
            total_steps: Some(i64::from(total_steps)),
            scheduled_date: Some(date),
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: NaiveTime::from_hms_opt(12, 0, 0),
            notes: Some("Side gate code 4412".to_string()),
            cleaner_ids: vec![sam.id()],
            ..NewCleaning::default()
        },
    )?;
    let id = record.id();
    println!(
        "- {} scheduled a {}-step cleaning at {} for {} with {}",
        roster.admin.profile.full_name,
        total_steps,
        record.cleaning.address,
        client.profile.full_name,
        sam.profile.full_name
    );

    let mut view = service.open_live_view(&session(client))?;
    render_view(&format!("{}'s live view", client.profile.full_name), &view, &roster);

    for current in 1..total_steps {
        service.update_cleaning(&session(sam), id, step(current))?;
    }
    report_changes(service, &mut view, &roster)?;

    attempt(
        &format!("{} (not assigned) records a step", lee.profile.full_name),
        || service.update_cleaning(&session(lee), id, step(total_steps)),
    );
    attempt(
        &format!("{} marks the cleaning completed early", sam.profile.full_name),
        || {
            let patch = CleaningPatch {
                status: Some(CleaningStatus::Completed),
                ..CleaningPatch::default()
            };
            service.update_cleaning(&session(sam), id, patch)
        },
    );

    println!(
        "- {} hands the cleaning over to {}",
        roster.admin.profile.full_name, lee.profile.full_name
    );
    service.update_cleaning(
        &admin,
        id,
        CleaningPatch {
            cleaner_ids: Some(vec![lee.id()]),
            ..CleaningPatch::default()
        },
    )?;
    attempt(
        &format!("{} records a step after reassignment", sam.profile.full_name),
        || service.update_cleaning(&session(sam), id, step(total_steps)),
    );

    let finished = service.update_cleaning(&session(lee), id, step(total_steps))?;
    println!(
        "- {} finished the last step -> {}",
        lee.profile.full_name, finished.record.cleaning.status
    );
    report_changes(service, &mut view, &roster)?;

    Ok(())
}

fn attempt<T>(label: &str, action: impl FnOnce() -> Result<T, SchedulingError>) {
    match action() {
        Ok(_) => println!("- {label}: accepted"),
        Err(err) => println!("- {label}: rejected ({err})"),
    }
}

fn report_changes(
    service: &MemoryService,
    view: &mut LiveView,
    roster: &DemoRoster,
) -> Result<(), AppError> {
    let changes = match view.drain() {
        Ok(changes) => changes,
        Err(FeedError::Lagged(skipped)) => {
            println!("  (view fell behind by {skipped} events; reloading)");
            service.resync_live_view(view)?;
            Vec::new()
        }
        Err(FeedError::Closed) => Vec::new(),
    };

    let applied = changes
        .iter()
        .filter(|change| **change != ViewChange::Unchanged)
        .count();
    render_view(
        &format!("Live view after {applied} change event(s)"),
        view,
        roster,
    );
    Ok(())
}

fn render_view(title: &str, view: &LiveView, roster: &DemoRoster) {
    println!("{title}:");
    if view.rows().is_empty() {
        println!("  (no cleanings)");
        return;
    }
    for record in view.rows() {
        let cleaning = &record.cleaning;
        let crew: Vec<&str> = record
            .cleaner_ids()
            .iter()
            .map(|id| display_name(roster, *id))
            .collect();
        println!(
            "  - {} {} {}-{} | {} | step {} | crew: {}",
            short_id(cleaning.id),
            cleaning.scheduled_date,
            cleaning.start_time.format("%H:%M"),
            cleaning.end_time.format("%H:%M"),
            cleaning.status,
            cleaning.progress_label(),
            if crew.is_empty() {
                "unassigned".to_string()
            } else {
                crew.join(", ")
            }
        );
    }
}

fn display_name(roster: &DemoRoster, id: ProfileId) -> &str {
    roster
        .cleaners
        .iter()
        .chain(roster.clients.iter())
        .chain(std::iter::once(&roster.admin))
        .find(|user| user.id() == id)
        .map(|user| user.profile.full_name.as_str())
        .unwrap_or("unknown")
}

fn short_id(id: CleaningId) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn single_step_demo_completes() {
        run_demo(DemoArgs {
            date: NaiveDate::from_ymd_opt(2025, 12, 1),
            total_steps: 1,
        })
        .expect("demo completes");
    }
}
