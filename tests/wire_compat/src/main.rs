fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use oseh_protocol::{
        ContentDigest, CreateUploadSessionRequest, DEFAULT_SHA512_KEY, JobClientPacket,
        JobIndicator, PartSpec, SearchRequest, is_part_already_uploaded, parse_event_batch,
        parse_search_response, parse_upload_session,
    };
    use oseh_transfer::PartPlan;

    /// SHA-512 of the ASCII bytes `oseh`, as stored in the fixtures.
    const FIXTURE_DIGEST: &str = "bbdd12281b0a364f347c3811affe3459f89a20a7d82c69d4022e3f3b655aea76f1b3aa9cffefc462c81ffc4cccb3f5953bf1111c7161f5b9d4ff0c374bfd1f7a";

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn fixture_bytes(name: &str) -> Vec<u8> {
        let path = fixtures_dir().join(name);
        fs::read(&path).unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_slice(&fixture_bytes(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Serializes `value` and compares it with a fixture, key order ignored.
    fn assert_matches_fixture<T: serde::Serialize>(value: &T, name: &str) {
        let fixture = load_fixture(name);
        let ours = serde_json::to_value(value)
            .unwrap_or_else(|e| panic!("failed to serialize for {name}: {e}"));
        assert_eq!(
            fixture, ours,
            "wire mismatch for {name}:\n  server: {fixture}\n  ours:   {ours}"
        );
    }

    fn digest() -> ContentDigest {
        ContentDigest::parse(FIXTURE_DIGEST).unwrap()
    }

    // --- Requests we send ---

    #[test]
    fn search_request_body() {
        let request = SearchRequest::by_sha512(DEFAULT_SHA512_KEY, &digest(), &Default::default());
        assert_matches_fixture(&request, "search_request.json");
    }

    #[test]
    fn create_upload_session_body() {
        let request = CreateUploadSessionRequest::new(16_000_000, &Default::default());
        assert_matches_fixture(&request, "create_upload_session_request.json");
    }

    #[test]
    fn job_authorize_packet() {
        let session =
            parse_upload_session(&fixture_bytes("upload_session_with_job.json")).unwrap();
        let job = session.progress.expect("fixture carries a job");
        assert_matches_fixture(&JobClientPacket::authorize(&job), "job_authorize.json");
    }

    // --- Responses we read ---

    #[test]
    fn upload_session_response() {
        let session = parse_upload_session(&fixture_bytes("upload_session.json")).unwrap();
        assert_eq!(session.uid, "oseh_fu_Mf3kQ1");
        assert!(session.jwt.starts_with("eyJ"));
        assert!(matches!(session.parts[0], PartSpec::Range(_)));
        assert!(matches!(session.parts[1], PartSpec::Single(_)));

        // Both part shapes re-serialize with exactly the keys they came with.
        let fixture = load_fixture("upload_session.json");
        assert_eq!(serde_json::to_value(&session.parts).unwrap(), fixture["parts"]);
    }

    #[test]
    fn upload_session_parts_tile_the_file() {
        let session = parse_upload_session(&fixture_bytes("upload_session.json")).unwrap();
        let plan = PartPlan::new(&session.parts, 16_000_000).unwrap();
        assert_eq!(plan.total_parts(), 4);

        let parts: Vec<_> = plan.iter().collect();
        assert_eq!(parts[0].start_byte, 0);
        assert_eq!(parts[2].end_byte, 15_728_640);
        assert_eq!(parts[3].number, 4);
        assert_eq!(parts[3].len(), 271_360);
    }

    #[test]
    fn upload_session_with_job_response() {
        let session =
            parse_upload_session(&fixture_bytes("upload_session_with_job.json")).unwrap();
        let job = session.progress.as_ref().unwrap();
        assert_eq!(job.uid, "oseh_job_7uTz2m");

        let fixture = load_fixture("upload_session_with_job.json");
        assert_eq!(serde_json::to_value(&session).unwrap()["progress"], fixture["progress"]);
    }

    #[test]
    fn job_event_batch_packet() {
        let text = String::from_utf8(fixture_bytes("job_event_batch.json")).unwrap();
        let batch = parse_event_batch(&text).unwrap();
        assert_eq!(
            batch.events[0].indicator,
            Some(JobIndicator::Bar { at: 2.0, of: 3.0 })
        );
        let last = batch.final_event().unwrap();
        assert_eq!(last.message, "processing complete");
        assert!(!last.is_failure());
    }

    #[test]
    fn search_response_with_match() {
        let found = parse_search_response(&fixture_bytes("search_response.json"))
            .unwrap()
            .expect("fixture has one item");
        assert_eq!(found.uid, "oseh_jac_2kP9sQ");
        assert_eq!(found.item["original_file_sha512"], FIXTURE_DIGEST);
        assert_eq!(found.item["audio_file"]["uid"], "oseh_cf_a8Zt1c");
    }

    #[test]
    fn search_response_without_match() {
        let found = parse_search_response(&fixture_bytes("search_response_empty.json")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn part_conflict_body() {
        assert!(is_part_already_uploaded(&fixture_bytes(
            "part_already_uploaded.json"
        )));
    }
}
