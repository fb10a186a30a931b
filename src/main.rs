use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skeleton_graph_analyzer::analysis;
use skeleton_graph_analyzer::config::{AnalysisConfig, DistanceMethod, WardInput};
use skeleton_graph_analyzer::data::parquet::{load_adjacency_matrix, ParquetSource};
use skeleton_graph_analyzer::data::{GraphInput, SkeletonId, SkeletonSource};
use skeleton_graph_analyzer::graph::algorithms::{find_all_paths, PathMode};
use skeleton_graph_analyzer::graph::{builder, network, GraphCache};
use skeleton_graph_analyzer::intersect::{neuron_in_volume, prune_to_volume, VolumeMode};
use skeleton_graph_analyzer::storage;
use skeleton_graph_analyzer::viz::{FilePlotSink, PlotSink};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "skeleton-graph-analyzer",
    about = "Graph analysis of neuron skeletons and their networks"
)]
struct Cli {
    /// Directory holding nodes.parquet, edges.parquet and friends
    #[clap(long, default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for results
    #[clap(long, default_value = "skeleton_results")]
    output_dir: PathBuf,

    /// JSON configuration file; command-line flags override it
    #[clap(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Geodesic distance from every treenode to its root
    DistToRoot {
        /// Skeletons to analyse; all skeletons in the data directory when omitted
        #[clap(long, value_delimiter = ',')]
        skeleton_ids: Vec<SkeletonId>,

        /// Only report treenodes with synapses
        #[clap(long)]
        synapses_only: bool,

        #[clap(long, value_enum)]
        method: Option<DistanceMethod>,
    },

    /// Ward clustering of a skeleton's synapse-bearing treenodes
    Cluster {
        #[clap(long)]
        skeleton_id: SkeletonId,

        #[clap(long, value_enum)]
        ward_input: Option<WardInput>,

        /// Write dendrogram and heatmap data
        #[clap(long)]
        plot: bool,
    },

    /// Neuron-level connectivity graph
    Network {
        /// Neurons to include (edges fetched from the data directory)
        #[clap(long, value_delimiter = ',', conflicts_with = "matrix")]
        skeleton_ids: Vec<SkeletonId>,

        /// Adjacency matrix parquet file instead of skeleton ids
        #[clap(long)]
        matrix: Option<PathBuf>,

        /// Connections weaker than this are excluded
        #[clap(long)]
        threshold: Option<u32>,

        /// Connections stronger than this are capped (matrix input only)
        #[clap(long)]
        cutoff: Option<u32>,
    },

    /// Enumerate simple paths between two treenodes of a skeleton
    Paths {
        #[clap(long)]
        skeleton_id: SkeletonId,

        #[clap(long)]
        from: i64,

        #[clap(long)]
        to: i64,

        #[clap(long, value_enum, default_value = "all")]
        mode: PathMode,

        /// Paths are extended while they hold at most this many treenodes
        #[clap(long)]
        max_len: Option<usize>,
    },

    /// Test which treenodes of a skeleton lie inside a mesh volume
    InVolume {
        #[clap(long)]
        skeleton_id: SkeletonId,

        /// Volume name, read from <data-dir>/volumes/<name>.json
        #[clap(long)]
        volume: String,

        /// Side of the volume kept in the pruned node table
        #[clap(long, value_enum, default_value = "in")]
        mode: VolumeMode,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    log::info!("Starting skeleton graph analysis");
    log::info!("Output: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    match args.command {
        Command::DistToRoot {
            skeleton_ids,
            synapses_only,
            method,
        } => {
            config.synapses_only |= synapses_only;
            if let Some(method) = method {
                config.distance_method = method;
            }

            let source = ParquetSource::new(&args.data_dir)?;
            let neurons = if skeleton_ids.is_empty() {
                source.all_neurons()?
            } else {
                skeleton_ids
                    .iter()
                    .map(|&id| source.neuron(id))
                    .collect::<Result<Vec<_>>>()?
            };
            log::info!("Loaded {} neurons", neurons.len());

            let mut cache = GraphCache::new();
            let maps = analysis::dist_from_root(GraphInput::Neurons(&neurons), &config, Some(&mut cache))?
                .into_maps();
            for (neuron, map) in neurons.iter().zip(&maps) {
                storage::save_distances(neuron.skeleton_id, map, &args.output_dir)?;
            }
        }

        Command::Cluster {
            skeleton_id,
            ward_input,
            plot,
        } => {
            config.plot |= plot;
            if let Some(ward_input) = ward_input {
                config.ward_input = ward_input;
            }

            let source = ParquetSource::new(&args.data_dir)?;
            let neuron = source.neuron(skeleton_id)?;
            let graph = builder::neuron_to_graph(&neuron)?;

            let mut sink = FilePlotSink::new(args.output_dir.join("visualizations"))?;
            let linkage = analysis::cluster_nodes_w_synapses(
                GraphInput::Graph(&graph),
                &config,
                Some(&mut sink),
            )?;
            if config.plot {
                sink.skeleton(&graph)?;
            }

            let observations = analysis::synapse_node_ids(&graph);
            storage::save_linkage(skeleton_id, &observations, &linkage, &args.output_dir)?;
            log::info!("Clustered {} synapse nodes in {} merges", observations.len(), linkage.len());
        }

        Command::Network {
            skeleton_ids,
            matrix,
            threshold,
            cutoff,
        } => {
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            if cutoff.is_some() {
                config.cutoff = cutoff;
            }

            let graph = match matrix {
                Some(path) => {
                    let matrix = load_adjacency_matrix(&path)?;
                    network::from_matrix(&matrix, config.threshold, config.cutoff)
                }
                None => {
                    let source = ParquetSource::new(&args.data_dir)?;
                    network::from_skeleton_ids(&skeleton_ids, &source, config.threshold)?
                }
            };
            log::info!(
                "Built network with {} neurons and {} connections",
                graph.vertex_count(),
                graph.edge_count()
            );

            storage::save_network_summary(&graph, &args.output_dir)?;
            let mut sink = FilePlotSink::new(args.output_dir.join("visualizations"))?;
            sink.network(&graph)?;
        }

        Command::Paths {
            skeleton_id,
            from,
            to,
            mode,
            max_len,
        } => {
            if max_len.is_some() {
                config.max_path_len = max_len;
            }

            let source = ParquetSource::new(&args.data_dir)?;
            let graph = builder::neuron_to_graph(&source.neuron(skeleton_id)?)?;
            let paths = find_all_paths(&graph, from, to, mode, config.max_path_len)?;
            log::info!("Found {} paths from {} to {}", paths.len(), from, to);

            storage::save_paths(skeleton_id, &paths, &args.output_dir)?;
        }

        Command::InVolume {
            skeleton_id,
            volume,
            mode,
        } => {
            let source = ParquetSource::new(&args.data_dir)?;
            let neuron = source.neuron(skeleton_id)?;
            let volume = source.volume(&volume)?;

            let inside = neuron_in_volume(&neuron, &volume);
            let pruned = prune_to_volume(&neuron, &volume, mode);
            storage::save_volume_membership(&neuron, &volume.name, &inside, &pruned, &args.output_dir)?;
        }
    }

    log::info!("Analysis complete. Results saved to {}", args.output_dir.display());

    Ok(())
}
