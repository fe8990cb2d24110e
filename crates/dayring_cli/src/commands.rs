use anyhow::{bail, Context, Result};
use dayring_core::model::time::parse_event_date;
use dayring_core::{
    sqlite_projection, DeviceScheduleEntry, EventRepository, Frequency, NewNormalEvent,
    NewSpecialEvent, NormalEvent, ScheduleResync, ScheduleStatus, ScheduleTrigger,
    SharedConnection, SpecialEvent, SqliteEventRepository, SqliteProjectionService, SystemClock,
    TimeOfDay, TriggerConfig,
};
use log::info;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Opened database plus the trigger every resync goes through.
pub struct App {
    events: SqliteEventRepository,
    trigger: Arc<ScheduleTrigger>,
    projection: Arc<SqliteProjectionService<SystemClock>>,
}

impl App {
    pub fn open(db: &Path, trigger_config: TriggerConfig) -> Result<Self> {
        let conn = SharedConnection::open(db)
            .with_context(|| format!("failed to open database {}", db.display()))?;
        let events = SqliteEventRepository::try_new(conn.clone())?;
        let projection = Arc::new(sqlite_projection(&conn, SystemClock)?);
        let engine: Arc<dyn ScheduleResync> = projection.clone();
        let trigger = Arc::new(ScheduleTrigger::new(engine, trigger_config));
        Ok(Self {
            events,
            trigger,
            projection,
        })
    }

    pub async fn run(&self) -> Result<()> {
        let handle = self.trigger.start();
        println!(
            "dayring: resyncing every {}; press Ctrl-C to stop",
            humantime::format_duration(self.trigger.config().interval)
        );

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("event=shutdown module=cli status=start");
        handle.stop().await;

        let stats = self.trigger.stats();
        println!(
            "dayring: stopped after {} runs ({} failed, {} skipped)",
            stats.runs, stats.failures, stats.skipped
        );
        Ok(())
    }

    pub async fn resync(&self) -> Result<()> {
        let count = self.trigger.resync_now().await.context("resync failed")?;
        println!("Published {count} entries for today");
        Ok(())
    }

    pub fn schedule(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Payload {
            status: Option<ScheduleStatus>,
            entries: Vec<DeviceScheduleEntry>,
        }

        let payload = Payload {
            status: self.projection.schedule_status()?,
            entries: self.projection.list_device_schedule()?,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        Ok(())
    }

    pub async fn add_normal(&self, input: NormalInput) -> Result<()> {
        let created = self.events.create_normal_event(&NewNormalEvent {
            frequency: parse_frequency(&input.frequency)?,
            time: parse_time(&input.time)?,
            title: input.title,
            delay: input.delay,
            tone: input.tone,
            active: input.active,
        })?;
        println!("Added normal event {}", created.id);
        self.resync().await
    }

    pub async fn update_normal(&self, id: i64, patch: NormalPatch) -> Result<()> {
        let Some(mut event) = self.events.get_normal_event(id)? else {
            bail!("normal event {id} not found");
        };
        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(time) = patch.time {
            event.time = parse_time(&time)?;
        }
        if let Some(frequency) = patch.frequency {
            event.frequency = parse_frequency(&frequency)?;
        }
        if let Some(delay) = patch.delay {
            event.delay = delay;
        }
        if let Some(tone) = patch.tone {
            event.tone = tone;
        }
        if let Some(active) = patch.active {
            event.active = active;
        }

        self.events.update_normal_event(&event)?;
        println!("Updated normal event {id}");
        self.resync().await
    }

    pub async fn delete_normal(&self, id: i64) -> Result<()> {
        self.events.delete_normal_event(id)?;
        println!("Deleted normal event {id}");
        self.resync().await
    }

    pub async fn add_special(
        &self,
        description: String,
        date: &str,
        time: &str,
        tone: String,
    ) -> Result<()> {
        let date = parse_event_date(date).with_context(|| format!("invalid date '{date}'"))?;
        let created = self.events.create_special_event(&NewSpecialEvent {
            date,
            time: parse_time(time)?,
            description,
            tone,
            completed: false,
        })?;
        println!("Added special event {}", created.id);
        self.resync().await
    }

    pub async fn complete_special(&self, id: i64) -> Result<()> {
        let Some(mut event) = self.events.get_special_event(id)? else {
            bail!("special event {id} not found");
        };
        if event.completed {
            println!("Special event {id} is already completed");
            return Ok(());
        }
        event.completed = true;
        self.events.update_special_event(&event)?;
        println!("Completed special event {id}");
        self.resync().await
    }

    pub async fn delete_special(&self, id: i64) -> Result<()> {
        self.events.delete_special_event(id)?;
        println!("Deleted special event {id}");
        self.resync().await
    }

    pub fn list(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Listing {
            normal_events: Vec<NormalEvent>,
            special_events: Vec<SpecialEvent>,
        }

        let listing = Listing {
            normal_events: self.events.list_normal_events()?,
            special_events: self.events.list_special_events_all()?,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        Ok(())
    }
}

pub struct NormalInput {
    pub title: String,
    pub time: String,
    pub frequency: String,
    pub delay: i64,
    pub tone: String,
    pub active: bool,
}

/// Fields of a recurring event to change; `None` keeps the stored value.
#[derive(Default)]
pub struct NormalPatch {
    pub title: Option<String>,
    pub time: Option<String>,
    pub frequency: Option<String>,
    pub delay: Option<i64>,
    pub tone: Option<String>,
    pub active: Option<bool>,
}

fn parse_frequency(raw: &str) -> Result<Frequency> {
    let parsed = Frequency::parse(raw);
    if let Some(issue) = parsed.malformed.first() {
        bail!("invalid frequency '{raw}': {issue}");
    }
    Ok(parsed.frequency)
}

fn parse_time(value: &str) -> Result<TimeOfDay> {
    value
        .parse()
        .with_context(|| format!("invalid time '{value}', expected HH:MM"))
}
