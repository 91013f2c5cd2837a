mod app;

use app::PickerApp;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mediapick=info".parse().unwrap()),
        )
        .init();

    let code = match PickerApp::from_env().and_then(|app| app.run()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("mediapick: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
