//! Counter app: a textbox and two buttons driving it.
//!
//! Run a rendering host locally, then:
//!
//! ```sh
//! cargo run --example counter
//! ```

use std::sync::Arc;

use easel_client::{connect, Button, Control, Stack, Textbox};

#[tokio::main]
async fn main() -> easel_client::Result<()> {
    tracing_subscriber::fmt::init();

    connect()
        .page_name("counter")
        .serve_app(|page| async move {
            page.set_title("Counter");
            if let Err(e) = page.update().await {
                tracing::error!(error = %e, "failed to set up page");
                return;
            }

            let value = Textbox::new();
            value.set_value("0");

            let shift = |delta: i64| {
                let value = value.clone();
                move |event: easel_client::ControlEvent| {
                    let value = value.clone();
                    async move {
                        let current: i64 = value.value().parse().unwrap_or(0);
                        value.set_value(&(current + delta).to_string());
                        if let Err(e) = event.page.update().await {
                            tracing::error!(error = %e, "update failed");
                        }
                    }
                }
            };

            let minus = Button::new("-");
            minus.on_click(shift(-1));
            let plus = Button::new("+");
            plus.on_click(shift(1));

            let row = Stack::new();
            row.set_horizontal(true);
            row.add_child(minus as Arc<dyn Control>);
            row.add_child(value.clone() as Arc<dyn Control>);
            row.add_child(plus as Arc<dyn Control>);

            if let Err(e) = page.add(vec![row as Arc<dyn Control>]).await {
                tracing::error!(error = %e, "failed to build page");
            }
        })
        .await
}
