use indicatif::{ProgressBar, ProgressStyle};

/// イメージ1つ分のビルド進捗表示
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(image: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_prefix(image.to_string());
        pb.set_message("Building...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// ビルド出力の1行を表示（`Step 3/7 : RUN ...` など）
    pub fn set_message(&self, msg: &str) {
        let line = msg.trim();
        if !line.is_empty() {
            self.progress_bar.set_message(line.to_string());
        }
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_with_message("Build completed ✓");
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("Build failed: {}", error));
    }
}
