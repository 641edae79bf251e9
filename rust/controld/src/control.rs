use crate::model::{Grade, Student};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Committee {
    /// 1-based committee number in seat order.
    pub number: usize,
    pub from_seat: Option<i64>,
    pub to_seat: Option<i64>,
    pub students: Vec<Student>,
}

/// Gives the students of `grade` consecutive seat numbers from `start`, in
/// their current order. Other students pass through untouched. Previous seat
/// numbers of the grade are overwritten.
///
/// Returns the updated roster and how many students were numbered. Students
/// past the end of the `i64` range are left without a seat.
pub fn assign_seats(students: &[Student], grade: Grade, start: i64) -> (Vec<Student>, usize) {
    let mut next = Some(start);
    let mut assigned = 0;
    let updated = students
        .iter()
        .map(|s| {
            let mut s = s.clone();
            if s.grade == grade {
                s.seating_number = next;
                if let Some(n) = next {
                    assigned += 1;
                    next = n.checked_add(1);
                }
            }
            s
        })
        .collect();
    (updated, assigned)
}

/// Sorts by seat number (missing counts as 0, ties keep input order) and
/// slices into committees of `size`; only the last may be shorter.
pub fn partition_committees(students: &[Student], size: usize) -> Vec<Committee> {
    let size = size.max(1);
    let mut ordered: Vec<Student> = students.to_vec();
    ordered.sort_by_key(|s| s.seating_number.unwrap_or(0));

    ordered
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| Committee {
            number: i + 1,
            from_seat: chunk.first().and_then(|s| s.seating_number),
            to_seat: chunk.last().and_then(|s| s.seating_number),
            students: chunk.to_vec(),
        })
        .collect()
}
