//! イメージ間の依存グラフ
//!
//! ノードはコレクション内のインデックスで表します。
//! ベースが管理対象イメージで、その fqn がコレクション内の別のイメージと
//! 一致するときに `依存先 → 依存元` の辺を張ります。

use crate::collection::ImageCollection;
use crate::error::{ImageError, Result};
use crate::model::ImageDescriptor;
use std::collections::HashMap;

/// 依存グラフ
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// ノードのラベル（fqn）
    labels: Vec<String>,
    /// node -> 依存先
    dependencies: Vec<Vec<usize>>,
    /// node -> 依存元
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn from_collection(images: &ImageCollection) -> Self {
        Self::from_images(images.as_slice())
    }

    pub fn from_images(images: &[ImageDescriptor]) -> Self {
        let labels: Vec<String> = images.iter().map(ImageDescriptor::fqn).collect();

        let mut by_fqn: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, fqn) in labels.iter().enumerate() {
            by_fqn.entry(fqn.as_str()).or_default().push(idx);
        }

        let mut dependencies = vec![Vec::new(); images.len()];
        let mut dependents = vec![Vec::new(); images.len()];

        for (idx, image) in images.iter().enumerate() {
            let Some(base) = image.base().as_image() else {
                continue;
            };
            let base_fqn = base.fqn();
            let Some(providers) = by_fqn.get(base_fqn.as_str()) else {
                continue;
            };
            for &provider in providers {
                // 自己参照は無視
                if provider == idx {
                    continue;
                }
                dependencies[idx].push(provider);
                dependents[provider].push(idx);
            }
        }

        Self {
            labels,
            dependencies,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, node: usize) -> &str {
        &self.labels[node]
    }

    /// `node` が依存するノード
    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    /// `node` に依存するノード
    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// トポロジカルなレイヤーに分割（Kahnのアルゴリズム）
    ///
    /// 各レイヤー内のノード同士には依存関係がなく、インデックス順に並びます。
    /// 依存の無いノードが見つからなくなった時点で残っているノードがあれば
    /// [`ImageError::CyclicDependency`] を返します。循環の下流にあるだけの
    /// ノードはエラーに含めません。
    pub fn layers(&self) -> Result<Vec<Vec<usize>>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut done = vec![false; self.len()];
        let mut layers = Vec::new();
        let mut remaining = self.len();

        while remaining > 0 {
            let layer: Vec<usize> = (0..self.len())
                .filter(|&node| !done[node] && in_degree[node] == 0)
                .collect();

            if layer.is_empty() {
                return Err(ImageError::CyclicDependency {
                    images: self.cycle_members(&done),
                });
            }

            for &node in &layer {
                done[node] = true;
                for &dependent in &self.dependents[node] {
                    in_degree[dependent] -= 1;
                }
            }
            remaining -= layer.len();
            layers.push(layer);
        }

        Ok(layers)
    }

    /// 未解決のノードから循環の下流にあるだけのノードを除いたもの
    fn cycle_members(&self, done: &[bool]) -> Vec<String> {
        let mut blocked: Vec<bool> = done.iter().map(|d| !d).collect();
        loop {
            let downstream: Vec<usize> = (0..self.len())
                .filter(|&node| {
                    blocked[node] && !self.dependents[node].iter().any(|&d| blocked[d])
                })
                .collect();
            if downstream.is_empty() {
                break;
            }
            for node in downstream {
                blocked[node] = false;
            }
        }

        (0..self.len())
            .filter(|&node| blocked[node])
            .map(|node| self.labels[node].clone())
            .collect()
    }

    /// 全ノードをトポロジカル順に並べる
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        Ok(self.layers()?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Base, ImageRef, Platform, Architecture};

    fn literal(name: &str) -> ImageDescriptor {
        ImageDescriptor::builder(name, "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish()
            .unwrap()
    }

    fn on(name: &str, base: &ImageDescriptor) -> ImageDescriptor {
        ImageDescriptor::builder(name, base).finish().unwrap()
    }

    fn reference(name: &str) -> ImageRef {
        ImageRef {
            organization: "layerflow".to_string(),
            name: name.to_string(),
            tag: "latest".to_string(),
            platform: Platform::new(Architecture::Amd64, "ubuntu-18.04"),
            title: None,
            runtime: None,
        }
    }

    #[test]
    fn test_chain_and_independent() {
        let a = literal("a");
        let b = on("b", &a);
        let c = on("c", &b);
        let d = literal("d");
        // 依存元を先に並べても順序は依存関係で決まる
        let images = vec![c.clone(), d.clone(), b.clone(), a.clone()];

        let graph = DependencyGraph::from_images(&images);
        assert_eq!(graph.dependencies(0), &[2]);
        assert_eq!(graph.dependencies(2), &[3]);
        assert_eq!(graph.dependents(3), &[2]);
        assert!(graph.dependencies(1).is_empty());

        let layers = graph.layers().unwrap();
        assert_eq!(layers, vec![vec![1, 3], vec![2], vec![0]]);
    }

    #[test]
    fn test_base_outside_collection_has_no_edge() {
        let a = literal("a");
        let b = on("b", &a);
        let graph = DependencyGraph::from_images(&[b]);

        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.layers().unwrap(), vec![vec![0]]);
    }

    #[test]
    fn test_duplicate_providers() {
        let a = literal("a");
        let b = on("b", &a);
        let images = vec![a.clone(), a, b];

        let graph = DependencyGraph::from_images(&images);
        assert_eq!(graph.dependencies(2), &[0, 1]);
        assert_eq!(graph.layers().unwrap(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_cycle_is_detected() {
        // 参照だけでベースを指定して循環を作る
        let x = ImageDescriptor::builder("x", Base::Image(reference("y")))
            .finish()
            .unwrap();
        let y = ImageDescriptor::builder("y", Base::Image(reference("x")))
            .finish()
            .unwrap();
        let z = literal("z");

        let graph = DependencyGraph::from_images(&[z, x, y]);
        match graph.layers() {
            Err(ImageError::CyclicDependency { images }) => {
                assert_eq!(
                    images,
                    vec![
                        "layerflow/amd64-ubuntu-18.04-x:latest",
                        "layerflow/amd64-ubuntu-18.04-y:latest",
                    ]
                );
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_excludes_downstream_images() {
        let x = ImageDescriptor::builder("x", Base::Image(reference("y")))
            .finish()
            .unwrap();
        let y = ImageDescriptor::builder("y", Base::Image(reference("x")))
            .finish()
            .unwrap();
        let z = on("z", &x);
        let w = on("w", &z);

        let graph = DependencyGraph::from_images(&[w, z, x, y]);
        match graph.layers() {
            Err(ImageError::CyclicDependency { images }) => {
                assert_eq!(
                    images,
                    vec![
                        "layerflow/amd64-ubuntu-18.04-x:latest",
                        "layerflow/amd64-ubuntu-18.04-y:latest",
                    ]
                );
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let x = ImageDescriptor::builder("x", Base::Image(reference("x")))
            .finish()
            .unwrap();
        let graph = DependencyGraph::from_images(&[x]);

        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.topological_order().unwrap(), vec![0]);
    }
}
