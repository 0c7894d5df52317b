//! パッケージマネージャーのコマンド生成
//!
//! いずれも引数だけから決まる純粋関数です。

pub(crate) const TAB: &str = "    ";

/// 空白のみの行を除いて各行の先頭に `prefix` を付ける
pub(crate) fn indent(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect()
}

/// テンプレートの `{}` に引数を1行ずつ埋め込む
fn render(template: &str, args: &[String]) -> String {
    let args = indent(&args.join(" \\\n"), TAB);
    let body = template.replace("{}", &args);
    let mut cmd = indent(&body, TAB).trim_start().to_string();
    cmd.push('\n');
    cmd
}

fn collect<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// apt-get install コマンド
pub fn apt<I, S>(packages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    render(
        "export DEBIAN_FRONTEND=noninteractive && \\\n\
         apt-get update -y -q && \\\n\
         apt-get install -y -q \\\n\
         {} && \\\n\
         rm -rf /var/lib/apt/lists/*",
        &collect(packages),
    )
}

/// apk add コマンド
pub fn apk<I, S>(packages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    render("apk add --no-cache -q \\\n{}", &collect(packages))
}

/// pip install コマンド
///
/// `files` は `-r <file>` としてパッケージより前に並びます。
pub fn pip<I, S, F, P>(packages: I, files: F) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut args: Vec<String> = files
        .into_iter()
        .map(|f| format!("-r {}", f.as_ref()))
        .collect();
    args.extend(collect(packages));
    render("pip install \\\n{}", &args)
}

/// conda install コマンド
///
/// `files` は `--file <file>` としてパッケージより前に並びます。
pub fn conda<I, S, F, P>(packages: I, files: F) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut args: Vec<String> = files
        .into_iter()
        .map(|f| format!("--file {}", f.as_ref()))
        .collect();
    args.extend(collect(packages));
    render(
        "conda install -y -q \\\n{} && \\\nconda clean -q --all",
        &args,
    )
}

/// `(リンク先, 元ファイル)` の組から `ln -sf` を連結したコマンドを生成
pub fn symlink<I, T, O>(links: I) -> String
where
    I: IntoIterator<Item = (T, O)>,
    T: AsRef<str>,
    O: AsRef<str>,
{
    let cmds: Vec<String> = links
        .into_iter()
        .map(|(target, original)| format!("ln -sf {} {}", original.as_ref(), target.as_ref()))
        .collect();
    cmds.join(&format!(" && \\\n{}", TAB))
}

pub fn mkdir(path: &str) -> String {
    format!("mkdir -p {}", path)
}
