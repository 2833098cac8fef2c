use secrecy::SecretString;
use zipseal_archive::{pack, unpack, ArchiveCodec, CodecOptions, Mode};
use zipseal_core::{ArchiveFile, Hooks};
use zipseal_crypto::KdfParams;

fn make_files(count: usize, size: usize) -> Vec<ArchiveFile> {
    (0..count)
        .map(|n| {
            let data = (0..size).map(|i| (i.wrapping_mul(13) ^ n) as u8).collect();
            ArchiveFile::guessed(format!("file-{n}.bin"), data)
        })
        .collect()
}

fn bench_codec(parallel: bool) -> ArchiveCodec {
    ArchiveCodec::new(CodecOptions {
        kdf: KdfParams { iterations: 1 },
        parallel,
        ..CodecOptions::default()
    })
}

#[divan::bench(args = [65536, 1048576])]
fn bench_pack_unpack(bencher: divan::Bencher, size: usize) {
    let data = make_files(1, size).remove(0).data;
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let bytes = pack([("entry", divan::black_box(data.as_slice()))], 6).unwrap();
            unpack(&bytes, None).unwrap()
        });
}

#[divan::bench(args = [false, true])]
fn bench_encode_secure(bencher: divan::Bencher, parallel: bool) {
    let codec = bench_codec(parallel);
    let files = make_files(16, 65536);
    let mode = Mode::Encrypted(SecretString::from("bench-password"));
    bencher
        .counter(divan::counter::BytesCount::new(16 * 65536usize))
        .bench(|| {
            codec
                .encode(divan::black_box(&files), &mode, Hooks::default())
                .unwrap()
        });
}

#[divan::bench(args = [false, true])]
fn bench_decode_secure(bencher: divan::Bencher, parallel: bool) {
    let codec = bench_codec(parallel);
    let password = SecretString::from("bench-password");
    let archive = codec
        .encode(
            &make_files(16, 65536),
            &Mode::Encrypted(SecretString::from("bench-password")),
            Hooks::default(),
        )
        .unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(16 * 65536usize))
        .bench(|| {
            codec
                .decode(divan::black_box(&archive), &password, Hooks::default())
                .unwrap()
        });
}

fn main() {
    divan::main();
}
