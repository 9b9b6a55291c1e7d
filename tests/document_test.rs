//! Document model tests: position-id stability, dual-backend query
//! agreement, text extraction and serialization.

use pith::Document;

const PAGE: &str = concat!(
    "<html><head><title>T</title></head><body>",
    "<div id=\"a\"><p>one</p><p>two</p></div>",
    "<div id=\"b\"><span>three</span>four</div>",
    "<ul><li>item1</li><li>item2</li></ul>",
    "</body></html>"
);

fn doc() -> Document {
    Document::parse(PAGE, "https://example.com/x", None).unwrap()
}

#[test]
fn position_ids_unique_and_stable_across_removals() {
    let mut d = doc();
    let all = d.walk(d.root());
    let pids: Vec<u32> = all.iter().map(|&n| d.position_id(n)).collect();
    let mut sorted = pids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), pids.len(), "ids must be unique");

    // removing one branch leaves every other id untouched
    let ul = d.query("//ul")[0];
    let survivors: Vec<u32> = d
        .walk(d.root())
        .into_iter()
        .filter(|&n| !d.walk(ul).contains(&n))
        .map(|n| d.position_id(n))
        .collect();
    d.remove_element(ul).unwrap();
    for pid in survivors {
        let node = d.resolve(pid).expect("survivor resolves");
        assert_eq!(d.position_id(node), pid);
    }
}

#[test]
fn reset_subtree_never_reissues_ids() {
    let mut d = doc();
    let before_max = d.max_position_id();
    let div = d.query("//div[@id='a']")[0];
    let wrapper = d.arena_mut().create_named("body");
    d.arena_mut().detach(div);
    d.arena_mut().append(wrapper, div);
    d.reset_subtree(wrapper).unwrap();

    assert!(d.next_position_id() > before_max);
}

#[test]
fn simple_and_general_backends_agree() {
    let d = doc();
    // each pair is the same selection expressed in both grammars; the
    // second form forces the general evaluator
    let pairs = [
        ("//p", "//p[not(@nosuch)]"),
        ("//div[@id='b']", "//div[@id='b'][not(@nosuch)]"),
        ("//li[2]", "//li[2][not(@nosuch)]"),
        ("/html/body/div", "/html/body/div[not(@nosuch)]"),
    ];
    for (simple, general) in pairs {
        assert_eq!(d.query(simple), d.query(general), "{simple} vs {general}");
    }
}

#[test]
fn query_returns_document_order() {
    let d = doc();
    let texts: Vec<String> = d
        .query("//p | //span | //li")
        .into_iter()
        .map(|n| d.arena().text(n).to_string())
        .collect();
    assert_eq!(texts, vec!["one", "two", "three", "item1", "item2"]);
}

#[test]
fn raw_text_walks_tails_in_order() {
    let d = doc();
    let b = d.query("//div[@id='b']")[0];
    assert_eq!(d.raw_text(b), "three\nfour");
}

#[test]
fn serialization_round_trip_preserves_structure() {
    let d = doc();
    let html = d.to_html();
    let reloaded = Document::load(&html, "https://example.com/x", None).unwrap();

    assert_eq!(d.query("//p").len(), reloaded.query("//p").len());
    let orig = d.query("//span")[0];
    let back = reloaded.query("//span")[0];
    assert_eq!(d.position_id(orig), reloaded.position_id(back));
}

#[test]
fn parse_rejects_empty_input() {
    assert!(Document::parse("", "https://example.com/", None).is_err());
    assert!(Document::parse("   \n ", "https://example.com/", None).is_err());
}

#[test]
fn hidden_subtrees_are_dropped_during_preprocess() {
    let d = Document::parse(
        concat!(
            "<html><body>",
            "<div style=\"display:none\"><p>invisible</p></div>",
            "<div aria-hidden=\"true\"><p>also invisible</p></div>",
            "<svg aria-hidden=\"true\"><path></path></svg>",
            "<p>visible</p>",
            "</body></html>"
        ),
        "https://example.com/x",
        None,
    )
    .unwrap();
    assert_eq!(d.raw_text(d.root()), "visible");
    // aria-hidden svg is the exception: kept for formula/icon rendering
    assert_eq!(d.query("//svg").len(), 1);
}
