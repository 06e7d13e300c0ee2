mod config;
mod error;
mod render;

use formcheck_lib::collection::ValidatedCollection;
use formcheck_lib::model::{Record, RecordId, Value};
use formcheck_lib::settings::SettingsHandle;
use formcheck_lib::submit::MockBackend;
use formcheck_lib::validators;
use simplelog::{Config, SimpleLogger};

use crate::config::CliConfig;
use crate::error::CliError;

fn blank_user(id: u64) -> Record {
    Record::new(id)
        .set("username", "")
        .set("fullName", "")
        .set("password1", "")
        .set("password2", "")
        .set("_imageBlob", Value::Null)
}

/// Type into fields of one record the way a user would.
fn fill(session: &mut ValidatedCollection, id: RecordId, values: Vec<(&str, Value)>) {
    for (field, value) in values {
        session.mark_focused(id, field);
        session.update_field(id, field, value);
        session.mark_dirty(id, field);
    }
}

async fn run() -> Result<(), CliError> {
    let config = CliConfig::from_env()?;
    SimpleLogger::init(config.log_level, Config::default())?;

    let settings = SettingsHandle::new(config.settings);
    let backend = MockBackend::new(settings.clone());
    let mut session = ValidatedCollection::new(validators::demo_rules(&settings)?)?;

    let (first, second) = (RecordId(1), RecordId(2));
    session.add_record(blank_user(1));
    session.add_record(blank_user(2));
    render::print_session(&session, "two empty users added");

    session.settle().await?;
    render::print_session(&session, "validated, nothing touched yet");

    let outcome = session.submit(&backend).await?;
    render::print_outcome(&outcome);
    render::print_session(&session, "after blocked submit");

    fill(
        &mut session,
        first,
        vec![
            ("username", "bob".into()),
            ("fullName", "Bob Builder".into()),
            ("password1", "secret".into()),
            ("password2", "secrets".into()),
            ("_imageBlob", validators::png_header(200, 150).into()),
        ],
    );
    fill(&mut session, second, vec![("fullName", "john".into())]);
    render::print_session(&session, "users typing");

    session.settle().await?;
    render::print_session(&session, "after typing");

    fill(
        &mut session,
        first,
        vec![
            ("username", "bobby".into()),
            ("password2", "secret".into()),
        ],
    );
    session.remove_record(second);
    session.settle().await?;
    render::print_session(&session, "first user fixed, second removed");

    let outcome = session.submit(&backend).await?;
    render::print_outcome(&outcome);
    render::print_session(&session, "after submit");

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
