use xiangqi_zero::evaluator::MaterialEvaluator;
use xiangqi_zero::selfplay::{generate_games, read_shard, record_size, write_shards, SelfPlayParams, SHARD_MAGIC};
use std::fs::{create_dir_all, remove_dir_all};

#[test]
fn write_and_read_shard() {
    let params = SelfPlayParams { games: 3, max_plies: 8, simulations: 8, seed: 123, ..Default::default() };
    let games = generate_games(&params, |_| MaterialEvaluator::default(), |_| {}).unwrap();
    let outdir = std::path::Path::new("target/selfplay_test");
    let _ = remove_dir_all(outdir);
    create_dir_all(outdir).unwrap();
    let shards = write_shards(&games, outdir, 10).unwrap();
    let expected: usize = games.iter().map(|g| g.examples.len()).sum();
    assert!(expected > 10);
    assert_eq!(shards.len(), (expected + 9) / 10);

    let bytes = std::fs::read(&shards[0]).unwrap();
    assert_eq!(&bytes[..8], SHARD_MAGIC);
    assert_eq!(bytes.len(), 12 + 10 * record_size(810));

    let recs = read_shard(&shards[0]).unwrap();
    assert_eq!(recs.len(), 10);
    let first = &games[0].examples[0];
    assert_eq!(recs[0].player, first.player.index() as u8);
    assert_eq!(recs[0].z, first.z as i8);
    assert_eq!(recs[0].state.len(), 810);
    assert_eq!(recs[0].policy, first.policy);
    let total: usize = shards.iter().map(|p| read_shard(p).unwrap().len()).sum();
    assert_eq!(total, expected);
}
