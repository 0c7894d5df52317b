mod commands;
mod docker;
mod utils;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "layerflow")]
#[command(about = "レイヤー化されたDockerイメージ群を、依存関係の順にビルドする", long_about = None)]
struct Cli {
    /// イメージ定義ファイル（省略時は images.kdl を探索）
    #[arg(long, global = true, value_name = "FILE")]
    images: Option<PathBuf>,

    /// 組み込みのイメージカタログを使用
    #[arg(long, global = true, conflicts_with = "images")]
    builtin: bool,

    /// 組み込みカタログが ADD するファイルのディレクトリ
    #[arg(long, global = true, value_name = "DIR", default_value = "docker")]
    assets: PathBuf,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// イメージの絞り込み条件（すべてglobパターン、AND条件）
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// イメージ名
    #[arg(long)]
    pub name: Option<String>,
    /// タグ
    #[arg(long)]
    pub tag: Option<String>,
    /// アーキテクチャ (amd64, arm64v8)
    #[arg(long)]
    pub arch: Option<String>,
    /// OS (例: 'ubuntu-*')
    #[arg(long)]
    pub os: Option<String>,
    /// バリアント (例: cuda)
    #[arg(long)]
    pub variant: Option<String>,
    /// organization
    #[arg(long)]
    pub org: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージの一覧を表示
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// JSONで出力
        #[arg(long)]
        json: bool,
    },
    /// 生成されるDockerfileを表示
    Dockerfile {
        /// イメージ名（globパターン可）
        #[arg(id = "image", value_name = "NAME")]
        image: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// 表示せずにディレクトリへ保存
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },
    /// 依存関係の順にイメージをビルド
    Build {
        #[command(flatten)]
        filters: FilterArgs,
        /// ビルド後にプッシュ
        #[arg(long)]
        push: bool,
        /// プッシュ先レジストリ（例: ghcr.io）
        #[arg(long, requires = "push")]
        registry: Option<String>,
        /// 同時ビルド数
        #[arg(short = 'j', long = "parallel", value_name = "N")]
        parallel: Option<usize>,
        /// キャッシュを使用しない
        #[arg(long)]
        no_cache: bool,
        /// ベースイメージを常にpull
        #[arg(long)]
        pull: bool,
        /// ADD の相対パスを解決するディレクトリ
        #[arg(long, value_name = "DIR")]
        context: Option<PathBuf>,
        /// ビルド引数 (KEY=VALUE)
        #[arg(long = "build-arg", value_name = "KEY=VALUE")]
        build_args: Vec<String>,
    },
    /// ビルド済みイメージをプッシュ
    Push {
        #[command(flatten)]
        filters: FilterArgs,
        /// プッシュ先レジストリ（例: ghcr.io）
        #[arg(long)]
        registry: Option<String>,
    },
    /// イメージ定義と依存グラフを検証
    Validate,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("layerflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = layerflow_config::Settings::load()?;
    let source = utils::Source {
        images: cli.images,
        builtin: cli.builtin,
        assets: cli.assets,
    };
    let images = utils::load_collection(&source, &settings)?;

    match cli.command {
        Commands::List { filters, json } => commands::list::handle(&images, &filters, json),
        Commands::Dockerfile {
            image,
            filters,
            save,
        } => commands::dockerfile::handle(&images, &image, &filters, save.as_deref()),
        Commands::Build {
            filters,
            push,
            registry,
            parallel,
            no_cache,
            pull,
            context,
            build_args,
        } => {
            let options = commands::build::options(
                &settings,
                parallel,
                no_cache,
                pull,
                context,
                &build_args,
            )?;
            commands::build::handle(&images, &filters, options, push.then_some(registry)).await
        }
        Commands::Push { filters, registry } => {
            commands::push::handle(&images, &filters, registry).await
        }
        Commands::Validate => commands::validate::handle(&images),
        Commands::Version => Ok(()),
    }
}
