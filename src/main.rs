use anyhow::{bail, Context, Result};
use convgenome::config::ConfigManager;
use convgenome::data::{load_from_file, save_to_file};
use convgenome::engines::generation::{
    generate_population, mate, mutate, random::seeded_or_entropy, random_genome, rare_mutate,
};
use convgenome::Genome;
use rand::Rng;

const USAGE: &str = "usage:
  convgenome generate   <config> <out>
  convgenome population <config> <out-dir>
  convgenome mutate     <config> <in> <out>
  convgenome mate       <config> <a> <b> <out>
  convgenome inspect    <config> <in>";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) if !rest.is_empty() => (command.as_str(), rest),
        _ => bail!("{}", USAGE),
    };

    let manager = ConfigManager::load_from_file(&rest[0])
        .with_context(|| format!("loading bounds from {}", rest[0]))?;
    let bounds = manager.bounds();
    let mut rng = seeded_or_entropy(manager.run().seed);

    match (command, &rest[1..]) {
        ("generate", [out]) => {
            let genome: Genome = random_genome(&bounds, &mut rng)?;
            save_to_file(&genome, out)?;
        }
        ("population", [out_dir]) => {
            let seed = manager.run().seed.unwrap_or_else(|| rng.gen());
            let population: Vec<Genome> =
                generate_population(&bounds, manager.run().population_size, seed)?;
            std::fs::create_dir_all(out_dir)?;
            for (index, genome) in population.iter().enumerate() {
                let path = std::path::Path::new(out_dir).join(format!("genome_{:04}.bin", index));
                save_to_file(genome, path)?;
            }
        }
        ("mutate", [input, out]) => {
            let mut genome: Genome = load_from_file(input, &bounds)?;
            let changed = mutate(&mut genome, &bounds, &mut rng);
            let restructured = rare_mutate(&mut genome, &bounds, &mut rng);
            log::info!("Mutation changed genes: {}, structure: {}", changed, restructured);
            save_to_file(&genome, out)?;
        }
        ("mate", [a, b, out]) => {
            let a: Genome = load_from_file(a, &bounds)?;
            let b: Genome = load_from_file(b, &bounds)?;
            let child = mate(&a, &b, &bounds, &mut rng)?;
            save_to_file(&child, out)?;
        }
        ("inspect", [input]) => {
            let genome: Genome = load_from_file(input, &bounds)?;
            println!("{}", genome.to_json()?);
        }
        _ => bail!("{}", USAGE),
    }

    Ok(())
}
