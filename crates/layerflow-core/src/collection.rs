//! イメージコレクション

use crate::client::{BuildOptions, ImageClient, PushOptions};
use crate::error::{ImageError, Result};
use crate::executor::{self, BuildReport};
use crate::filter::Filter;
use crate::model::ImageDescriptor;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::{Add, Index};
use std::str::FromStr;

/// 検索・グループ化に使用できる属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Name,
    Tag,
    Organization,
    Architecture,
    Os,
    Variant,
    Title,
    Runtime,
    Repo,
    Fqn,
    Base,
}

impl Attribute {
    pub const ALL: [Attribute; 11] = [
        Attribute::Name,
        Attribute::Tag,
        Attribute::Organization,
        Attribute::Architecture,
        Attribute::Os,
        Attribute::Variant,
        Attribute::Title,
        Attribute::Runtime,
        Attribute::Repo,
        Attribute::Fqn,
        Attribute::Base,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Tag => "tag",
            Attribute::Organization => "organization",
            Attribute::Architecture => "arch",
            Attribute::Os => "os",
            Attribute::Variant => "variant",
            Attribute::Title => "title",
            Attribute::Runtime => "runtime",
            Attribute::Repo => "repo",
            Attribute::Fqn => "fqn",
            Attribute::Base => "base",
        }
    }

    /// イメージから属性値を取り出す
    pub fn value_of(&self, image: &ImageDescriptor) -> Option<String> {
        match self {
            Attribute::Name => Some(image.name().to_string()),
            Attribute::Tag => Some(image.tag().to_string()),
            Attribute::Organization => Some(image.organization().to_string()),
            Attribute::Architecture => Some(image.architecture().to_string()),
            Attribute::Os => Some(image.os().to_string()),
            Attribute::Variant => image.variant().map(str::to_string),
            Attribute::Title => image.title().map(str::to_string),
            Attribute::Runtime => image.runtime().map(str::to_string),
            Attribute::Repo => Some(image.repo()),
            Attribute::Fqn => Some(image.fqn()),
            Attribute::Base => Some(image.base().to_string()),
        }
    }
}

impl FromStr for Attribute {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "arch" | "architecture" => Ok(Attribute::Architecture),
            "org" | "organization" => Ok(Attribute::Organization),
            other => Attribute::ALL
                .into_iter()
                .find(|attr| attr.as_str() == other)
                .ok_or_else(|| ImageError::Validation(format!("未知の属性です: `{}`", other))),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 属性値に対する条件
#[derive(Debug, Clone)]
pub enum Criterion {
    /// 値が等しい（`None` は値が無いことを意味する）
    Equals(Option<String>),
    /// 述語に一致（値が無い場合は一致しない）
    Matches(Filter),
}

impl Criterion {
    pub fn accepts(&self, value: Option<&str>) -> bool {
        match self {
            Criterion::Equals(expected) => expected.as_deref() == value,
            Criterion::Matches(filter) => filter.matches_opt(value),
        }
    }
}

impl From<&str> for Criterion {
    fn from(value: &str) -> Self {
        Criterion::Equals(Some(value.to_string()))
    }
}

impl From<String> for Criterion {
    fn from(value: String) -> Self {
        Criterion::Equals(Some(value))
    }
}

impl From<Option<String>> for Criterion {
    fn from(value: Option<String>) -> Self {
        Criterion::Equals(value)
    }
}

impl From<Filter> for Criterion {
    fn from(filter: Filter) -> Self {
        Criterion::Matches(filter)
    }
}

/// 順序付きのイメージ集合
///
/// 重複を許し、追加された順序を保持します。
/// `filter` / `group_by` は元のコレクションを変更しません。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ImageCollection {
    images: Vec<ImageDescriptor>,
}

impl ImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageDescriptor> {
        self.images.iter()
    }

    /// 末尾にイメージを追加
    pub fn push_image(&mut self, image: ImageDescriptor) {
        self.images.push(image);
    }

    pub fn as_slice(&self) -> &[ImageDescriptor] {
        &self.images
    }

    /// 全条件（AND）に一致するイメージを順序を保って返す
    pub fn filter<I, C>(&self, criteria: I) -> ImageCollection
    where
        I: IntoIterator<Item = (Attribute, C)>,
        C: Into<Criterion>,
    {
        let mut selected: Vec<&ImageDescriptor> = self.images.iter().collect();
        for (attribute, criterion) in criteria {
            let criterion = criterion.into();
            selected.retain(|image| criterion.accepts(attribute.value_of(image).as_deref()));
        }
        selected.into_iter().cloned().collect()
    }

    /// 属性値ごとにグループ化
    ///
    /// 各グループ内の順序は元のコレクションの順序に従います。
    pub fn group_by(&self, attribute: Attribute) -> BTreeMap<Option<String>, ImageCollection> {
        let mut groups: BTreeMap<Option<String>, ImageCollection> = BTreeMap::new();
        for image in &self.images {
            groups
                .entry(attribute.value_of(image))
                .or_default()
                .push_image(image.clone());
        }
        groups
    }

    /// 条件に一致するイメージがちょうど1つであることを要求
    pub fn get<I, C>(&self, criteria: I) -> Result<&ImageDescriptor>
    where
        I: IntoIterator<Item = (Attribute, C)>,
        C: Into<Criterion>,
    {
        let criteria: Vec<(Attribute, Criterion)> =
            criteria.into_iter().map(|(a, c)| (a, c.into())).collect();

        let mut found = self.images.iter().filter(|image| {
            criteria
                .iter()
                .all(|(attribute, criterion)| criterion.accepts(attribute.value_of(image).as_deref()))
        });

        let first = found.next().ok_or(ImageError::NotFound)?;
        let rest: Vec<String> = found.map(ImageDescriptor::fqn).collect();
        if rest.is_empty() {
            Ok(first)
        } else {
            let mut names = vec![first.fqn()];
            names.extend(rest);
            Err(ImageError::Ambiguous(names))
        }
    }

    /// fqn で最初に一致するイメージ
    pub fn find_by_fqn(&self, fqn: &str) -> Option<&ImageDescriptor> {
        self.images.iter().find(|image| image.fqn() == fqn)
    }

    /// fqn の重複を除く（最初の出現を残す）
    pub fn unique(&self) -> ImageCollection {
        let mut seen = HashSet::new();
        self.images
            .iter()
            .filter(|image| seen.insert(image.fqn()))
            .cloned()
            .collect()
    }

    /// 依存関係の順にビルド
    ///
    /// 失敗またはスキップがあった場合は [`ImageError::Incomplete`] を返します。
    pub async fn build(
        &self,
        client: &dyn ImageClient,
        options: &BuildOptions,
    ) -> Result<BuildReport> {
        executor::build_all(&self.images, client, options)
            .await?
            .into_result()
    }

    /// コレクションの順にプッシュ
    pub async fn push(&self, client: &dyn ImageClient, options: &PushOptions) -> Result<BuildReport> {
        executor::push_all(&self.images, client, options)
            .await
            .into_result()
    }
}

impl FromIterator<ImageDescriptor> for ImageCollection {
    fn from_iter<T: IntoIterator<Item = ImageDescriptor>>(iter: T) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ImageDescriptor>> for ImageCollection {
    fn from(images: Vec<ImageDescriptor>) -> Self {
        Self { images }
    }
}

impl Extend<ImageDescriptor> for ImageCollection {
    fn extend<T: IntoIterator<Item = ImageDescriptor>>(&mut self, iter: T) {
        self.images.extend(iter);
    }
}

impl IntoIterator for ImageCollection {
    type Item = ImageDescriptor;
    type IntoIter = std::vec::IntoIter<ImageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

impl<'a> IntoIterator for &'a ImageCollection {
    type Item = &'a ImageDescriptor;
    type IntoIter = std::slice::Iter<'a, ImageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

impl Index<usize> for ImageCollection {
    type Output = ImageDescriptor;

    fn index(&self, index: usize) -> &ImageDescriptor {
        &self.images[index]
    }
}

impl Add for ImageCollection {
    type Output = ImageCollection;

    fn add(mut self, rhs: ImageCollection) -> ImageCollection {
        self.images.extend(rhs.images);
        self
    }
}
