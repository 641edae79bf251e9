mod test_support;

use serde_json::{json, Value};
use test_support::{open_workspace, request_err_code, request_ok};

#[test]
fn assign_seats_numbers_one_grade_and_committees_chunk_them() {
    let (workspace, mut child, mut stdin, mut reader) = open_workspace("controld-seating");

    for i in 0..5 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g1-{}", i),
            "students.upsert",
            json!({ "student": { "id": format!("g1-{}", i), "name": format!("طالب {}", i), "grade": "G1", "section": "أ" } }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "g2",
        "students.upsert",
        json!({ "student": { "id": "g2-0", "name": "آخر", "grade": "G2", "section": "ب", "seatingNumber": 7 } }),
    );

    let assigned = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "control.assignSeats",
        json!({ "grade": "G1", "startNumber": 500 }),
    );
    assert_eq!(assigned["assigned"], 5);
    let mut seats: Vec<i64> = assigned["students"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|s| s["seatingNumber"].as_i64()).collect())
        .unwrap_or_default();
    seats.sort_unstable();
    assert_eq!(seats, vec![500, 501, 502, 503, 504]);

    // Other grades keep their numbers.
    let g2 = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({ "grade": "G2" }));
    assert_eq!(g2["students"][0]["seatingNumber"], 7);

    let committees = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "control.committees",
        json!({ "grade": "G1", "committeeSize": 2 }),
    );
    assert_eq!(committees["count"], 3);
    let list = committees["committees"].as_array().cloned().unwrap_or_default();
    let sizes: Vec<usize> = list
        .iter()
        .map(|c| c["students"].as_array().map(Vec::len).unwrap_or(0))
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(list[0]["number"], 1);
    assert_eq!(list[0]["fromSeat"], 500);
    assert_eq!(list[0]["toSeat"], 501);
    assert_eq!(list[2]["fromSeat"], 504);
    let flattened: Vec<i64> = list
        .iter()
        .flat_map(|c| c["students"].as_array().cloned().unwrap_or_default())
        .filter_map(|s: Value| s["seatingNumber"].as_i64())
        .collect();
    assert_eq!(flattened, vec![500, 501, 502, 503, 504]);

    // Non-positive sizes fall back to one student per committee.
    let singles = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "control.committees",
        json!({ "grade": "G1", "committeeSize": 0 }),
    );
    assert_eq!(singles["count"], 5);

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "control.committees",
        json!({ "grade": "G9" }),
    );
    assert_eq!(empty["count"], 0);

    let code = request_err_code(&mut stdin, &mut reader, "6", "control.assignSeats", json!({}));
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn start_number_outside_the_seat_range_is_rejected() {
    let (workspace, mut child, mut stdin, mut reader) = open_workspace("controld-seat-range");
    for id in ["a", "b"] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "students.upsert",
            json!({ "student": { "id": id, "name": id, "grade": "G1", "seatingNumber": 12 } }),
        );
    }

    for (id, start) in [("1", json!(i64::MAX)), ("2", json!(-1)), ("3", json!(10_000_001)), ("4", json!("1001"))] {
        let code = request_err_code(
            &mut stdin,
            &mut reader,
            id,
            "control.assignSeats",
            json!({ "grade": "G1", "startNumber": start }),
        );
        assert_eq!(code, "bad_params");
    }

    // The sidecar is still serving and nothing was renumbered.
    let listed = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({ "grade": "G1" }));
    let seats: Vec<i64> = listed["students"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|s| s["seatingNumber"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(seats, vec![12, 12]);

    let top = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "control.assignSeats",
        json!({ "grade": "G1", "startNumber": 10_000_000 }),
    );
    assert_eq!(top["assigned"], 2);
    assert_eq!(top["students"][1]["seatingNumber"], 10_000_001);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn settings_defaults_drive_seating_and_updates_persist() {
    let (workspace, mut child, mut stdin, mut reader) = open_workspace("controld-settings");

    let settings = request_ok(&mut stdin, &mut reader, "1", "settings.get", json!({}));
    assert_eq!(settings["control"]["startSeatNumber"], 1001);
    assert_eq!(settings["control"]["committeeSize"], 20);
    assert_eq!(settings["school"]["schoolName"], "");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.upsert",
        json!({ "student": { "id": "only", "name": "وحيد", "grade": "G3" } }),
    );
    let assigned = request_ok(&mut stdin, &mut reader, "3", "control.assignSeats", json!({ "grade": "G3" }));
    assert_eq!(assigned["students"][0]["seatingNumber"], 1001);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "settings.update",
        json!({ "section": "control", "patch": { "startSeatNumber": 3000 } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "section": "school", "patch": { "schoolName": "مدرسة النور", "activeYear": "2025/2026" } }),
    );
    let settings = request_ok(&mut stdin, &mut reader, "6", "settings.get", json!({}));
    assert_eq!(settings["control"]["startSeatNumber"], 3000);
    assert_eq!(settings["control"]["committeeSize"], 20);
    assert_eq!(settings["school"]["schoolName"], "مدرسة النور");

    let assigned = request_ok(&mut stdin, &mut reader, "7", "control.assignSeats", json!({ "grade": "G3" }));
    assert_eq!(assigned["students"][0]["seatingNumber"], 3000);

    for (id, params) in [
        ("8", json!({ "section": "control", "patch": { "committeeSize": 0 } })),
        ("9", json!({ "section": "control", "patch": { "color": "red" } })),
        ("10", json!({ "section": "theme", "patch": {} })),
        ("11", json!({ "section": "school" })),
    ] {
        let code = request_err_code(&mut stdin, &mut reader, id, "settings.update", params);
        assert_eq!(code, "bad_params");
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
