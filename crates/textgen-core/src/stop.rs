//! Stop-sequence matching.

/// Byte offset of the earliest stop sequence in `text`. Empty stops never
/// match.
pub fn find_stop<S: AsRef<str>>(text: &str, stops: &[S]) -> Option<usize> {
    stops
        .iter()
        .map(AsRef::as_ref)
        .filter(|stop| !stop.is_empty())
        .filter_map(|stop| text.find(stop))
        .min()
}

/// Cut `text` before its earliest stop sequence. The stop itself is dropped.
pub(crate) fn truncate_at_stop<S: AsRef<str>>(mut text: String, stops: &[S]) -> String {
    if let Some(at) = find_stop(&text, stops) {
        text.truncate(at);
    }
    text
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn earliest_stop_wins_regardless_of_list_order() {
        let stops = ["\n\n", "Q:"];
        assert_eq!(find_stop("answer Q: more\n\nrest", &stops), Some(7));
        assert_eq!(truncate_at_stop("answer Q: more\n\nrest".to_owned(), &stops), "answer ");
    }

    #[test]
    fn no_match_keeps_text() {
        assert_eq!(find_stop("plain text", &["Q:"]), None);
        assert_eq!(truncate_at_stop("plain text".to_owned(), &["Q:"]), "plain text");
    }

    #[test]
    fn empty_stops_are_ignored() {
        assert_eq!(find_stop("abc", &["", "c"]), Some(2));
        assert_eq!(find_stop::<&str>("abc", &[]), None);
    }

    #[test]
    fn stop_at_start_yields_empty_text() {
        assert_eq!(truncate_at_stop("Q: next".to_owned(), &["Q:"]), "");
    }

    #[test]
    fn multibyte_text_is_cut_on_a_char_boundary() {
        let text = "héllo wörld\n\nQ:".to_owned();
        assert_eq!(truncate_at_stop(text, &["\n\n"]), "héllo wörld");
    }
}
