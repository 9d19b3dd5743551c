//! The `graph` command: knowledge-graph summary from the build cache.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::cache::BuildCache;
use crate::config::SiteConfig;
use crate::incremental::Dependency;

pub fn run(config: &SiteConfig, tree: bool, stats: bool) -> Result<()> {
    let (cache, warning) = BuildCache::load(&config.cache_file());
    if let Some(warning) = warning {
        crate::log!("graph"; "{warning}");
    }
    if cache.dependencies.is_empty() {
        crate::log!("graph"; "no dependency data; run a build first");
        return Ok(());
    }

    if tree {
        print_tree(&cache);
    }
    if stats || !tree {
        print_stats(&cache);
    }
    Ok(())
}

fn print_tree(cache: &BuildCache) {
    let mut keys: Vec<_> = cache.dependencies.keys().collect();
    keys.sort();
    for key in keys {
        println!("{key}");
        let mut deps: Vec<&Dependency> = cache.dependencies[key].iter().collect();
        deps.sort_by_key(|d| d.reverse_key());
        for dep in deps {
            println!("  └─ {:<8} {}", dep.kind.label(), dep.target);
        }
    }
}

fn print_stats(cache: &BuildCache) {
    let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut total_edges = 0usize;
    for deps in cache.dependencies.values() {
        for dep in deps {
            *per_kind.entry(dep.kind.label()).or_insert(0) += 1;
            total_edges += 1;
        }
    }

    println!("pages tracked: {}", cache.dependencies.len());
    println!("dependency edges: {total_edges}");
    for (kind, count) in per_kind {
        println!("  {kind:<10} {count}");
    }
    println!("cached renders: {}", cache.rendered_output.len());
    println!("cached parses: {}", cache.parsed_content.len());
}
