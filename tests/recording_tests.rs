use call_assist::RecordingWriter;

#[test]
fn finished_recording_is_a_valid_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("take.wav");

    // Setup: write two frames of interleaved stereo PCM16
    let mut writer = RecordingWriter::create(&path, 16_000, 2).unwrap();
    let frame: Vec<u8> = (0u16..160)
        .flat_map(|sample| (sample as i16).to_le_bytes())
        .collect();
    writer.append_pcm(&frame);
    writer.append_pcm(&frame);
    writer.finish().unwrap();

    // Verify: header and samples survive a round trip through hound
    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 320);
    assert_eq!(samples[0], 0);
    assert_eq!(samples[159], 159);
    assert!(!writer.has_failed());
}

#[test]
fn odd_trailing_byte_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.wav");

    let mut writer = RecordingWriter::create(&path, 16_000, 1).unwrap();
    writer.append_pcm(&[0x01, 0x02, 0x03]);
    writer.finish().unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len(), 1);
}

#[test]
fn finish_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.wav");

    let mut writer = RecordingWriter::create(&path, 16_000, 1).unwrap();
    writer.append_pcm(&[0x01, 0x00]);
    writer.finish().unwrap();
    writer.finish().unwrap();

    assert!(path.exists());
}

#[test]
fn drop_finalizes_an_unfinished_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.wav");

    {
        let mut writer = RecordingWriter::create(&path, 16_000, 1).unwrap();
        writer.append_pcm(&[0x01, 0x00, 0x02, 0x00]);
    }

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len(), 2);
}
