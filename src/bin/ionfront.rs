use clap::Parser;
use log::{error, info, LevelFilter};
use serde::Serialize;
use ionfront::grid::Conserved;
use ionfront::index_space::IndexSpace3;
use ionfront::mesh::{DomainSpec, Layout, Mesh};
use ionfront::message::{run_group, Communicator, LocalCommunicator};
use ionfront::rates::Species;
use ionfront::subcycle::Outcome;
use ionfront::{Error, IonRadiation, RadiationConfig};




/// Drive an ionization front into a uniform neutral cloud on a two-level
/// mesh, with each process of the run simulated by a thread.
///
#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    /// Number of ranks; the root domain is split into this many slabs
    /// along the x axis
    #[clap(short = 'r', long, default_value = "2")]
    ranks: usize,

    /// Number of hydrodynamic steps
    #[clap(short = 'n', long, default_value = "10")]
    steps: usize,

    /// Hydrodynamic timestep offered to the radiation module (s)
    #[clap(long, default_value = "1e10")]
    dt: f64,

    /// Root grid cells per axis
    #[clap(short = 'c', long, default_value = "16")]
    cells: i64,

    /// Root grid cell width (cm)
    #[clap(long, default_value = "1e16")]
    spacing: f64,

    /// Photon number flux through the source plane (1/cm^2/s)
    #[clap(short = 'f', long, default_value = "1e9")]
    flux: f64,

    /// Source direction code: -1, -2, -3 for the lower x, y, z face and
    /// 1, 2, 3 for the upper face
    #[clap(long, default_value = "-1", allow_hyphen_values = true)]
    direction: i32,

    /// Neutral hydrogen number density of the cloud (1/cm^3)
    #[clap(long, default_value = "10")]
    density: f64,

    /// Temperature of the cloud (K)
    #[clap(long, default_value = "100")]
    temperature: f64,

    /// Radiation parameter table (CBOR); missing entries take defaults
    #[clap(long)]
    config: Option<String>,

    /// Where to write the final state (CBOR)
    #[clap(short = 'o', long, default_value = "ionfront.cbor")]
    output: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: LevelFilter,
}




#[derive(Serialize)]
struct GridState {
    level: usize,
    domain: usize,
    block: usize,
    region: IndexSpace3,
    ionization_fraction: Vec<f64>,
    temperature: Vec<f64>,
}




#[derive(Serialize)]
struct State {
    time: f64,
    steps: usize,
    grids: Vec<GridState>,
}




// ============================================================================
fn initial_cell(config: &RadiationConfig, n_h: f64, temperature: f64) -> Conserved {
    let density = n_h * config.m_h;
    let mut u = Conserved { density, neutral_density: density, ..Default::default() };
    u.energy = Species::from_conserved(&u, config).thermal_energy_at(density, temperature, config);
    u
}

fn domain_specs(opts: &Opts) -> Result<Vec<DomainSpec>, Error> {
    let n = opts.cells;
    let ranks: Vec<usize> = (0..opts.ranks).collect();

    Ok(vec![
        DomainSpec {
            level: 0,
            region: IndexSpace3::new(0..n, 0..n, 0..n),
            layout: Layout::new([opts.ranks, 1, 1], ranks.clone())?,
        },
        DomainSpec {
            level: 1,
            region: IndexSpace3::new(0..2 * n, n / 2..3 * n / 2, n / 2..3 * n / 2),
            layout: Layout::new([opts.ranks, 1, 1], ranks)?,
        },
    ])
}

fn simulate(opts: &Opts, config: &RadiationConfig, comm: LocalCommunicator) -> Result<State, Error> {
    let mut mesh = Mesh::new([opts.spacing; 3], 2, domain_specs(opts)?, comm.rank(), comm.size())?;
    let u = initial_cell(config, opts.density, opts.temperature);

    for grid in mesh.grids_mut() {
        grid.set_interior(|_| u)
    }

    let mut radiation = IonRadiation::new(config.clone())?;
    radiation.initialize_for_mesh(&mesh)?;
    radiation.add_source(&mut mesh, opts.direction, opts.flux)?;

    for step in 0..opts.steps {
        mesh.dt = opts.dt;
        let reports = radiation.advance_mesh(&mut mesh, &comm)?;
        mesh.time += mesh.dt;

        if comm.rank() == 0 {
            let truncated = reports.iter().filter(|r| r.outcome == Outcome::MaxIterReached).count();
            info!("[{}] t={:.4e} dt={:.4e} truncated={}", step, mesh.time, mesh.dt, truncated);
        }
    }

    let grids = mesh
        .grids()
        .map(|grid| {
            let species: Vec<Species> = grid
                .interior()
                .iter()
                .map(|index| Species::from_conserved(grid.cell(index), config))
                .collect();
            GridState {
                level: grid.level(),
                domain: grid.domain(),
                block: grid.block(),
                region: grid.region().clone(),
                ionization_fraction: species.iter().map(|s| s.x).collect(),
                temperature: species.iter().map(|s| s.temperature).collect(),
            }
        })
        .collect();

    Ok(State { time: mesh.time, steps: opts.steps, grids })
}

fn load_config(path: &Option<String>) -> Result<RadiationConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            let config: RadiationConfig = ciborium::de::from_reader(std::io::BufReader::new(file))
                .map_err(|e| Error::Decode(format!("{}: {:?}", path, e)))?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(RadiationConfig::default()),
    }
}

fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&opts.config)?;
    let results = run_group(opts.ranks, |comm| simulate(&opts, &config, comm))?;
    let mut state = State { time: 0.0, steps: opts.steps, grids: Vec::new() };

    for result in results {
        let part = result?;
        state.time = part.time;
        state.grids.extend(part.grids);
    }

    let file = std::fs::File::create(&opts.output)?;
    let mut buffer = std::io::BufWriter::new(file);
    ciborium::ser::into_writer(&state, &mut buffer).map_err(|e| Error::Encode(format!("{:?}", e)))?;
    info!("wrote {}", opts.output);
    Ok(())
}




// ============================================================================
fn main() {
    let opts = Opts::parse();

    if let Err(e) = simple_logger::SimpleLogger::new().with_level(opts.log_level).init() {
        eprintln!("{}", e);
    }
    info!("{:?}", opts);

    if let Err(e) = run(opts) {
        error!("{}", e);
        std::process::exit(1);
    }
}
