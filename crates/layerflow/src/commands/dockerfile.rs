use crate::FilterArgs;
use crate::utils;
use colored::Colorize;
use layerflow_core::ImageCollection;
use std::path::Path;

pub fn handle(
    images: &ImageCollection,
    name: &str,
    filters: &FilterArgs,
    save: Option<&Path>,
) -> anyhow::Result<()> {
    let filters = FilterArgs {
        name: Some(name.to_string()),
        ..filters.clone()
    };
    let selected = utils::select(images, &filters)?;

    for (idx, image) in selected.iter().enumerate() {
        match save {
            Some(dir) => {
                let path = image.save_dockerfile(dir)?;
                tracing::debug!(image = %image.fqn(), path = %path.display(), "Saved Dockerfile");
                println!(
                    "{} {}",
                    "✓".green(),
                    path.display().to_string().cyan()
                );
            }
            None => {
                if idx > 0 {
                    println!();
                }
                println!("# {}", image.fqn());
                print!("{}", image.render_dockerfile());
            }
        }
    }

    Ok(())
}
