use anyhow::Result;

use super::print_snapshot;
use crate::bootstrap::App;

pub async fn run(app: &App) -> Result<()> {
    app.manager.activate(app.mode()).await;
    print_snapshot(&app.manager.snapshot())
}
