use scribe_placeholder::{PlaceholderConfig, PlaceholderOption, validate_config};

fn config(options: Vec<PlaceholderOption>) -> PlaceholderConfig {
    PlaceholderConfig {
        label: "Placeholder".to_string(),
        options,
    }
}

#[test]
fn a_well_formed_config_has_no_issues() {
    let config = config(vec![
        PlaceholderOption::new("[First Name]", "firstname"),
        PlaceholderOption::new("[Link]", "link").with_kind("calltoaction"),
    ]);
    assert!(validate_config(&config).is_empty());
}

#[test]
fn a_missing_value_names_the_option_and_field() {
    let config = config(vec![
        PlaceholderOption::new("[First Name]", "firstname"),
        PlaceholderOption::new("[Broken]", ""),
    ]);

    let issues = validate_config(&config);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].option, Some(1));
    assert_eq!(issues[0].field, "value");
    assert_eq!(issues[0].to_string(), "option[1].value: a value is required");
}

#[test]
fn an_empty_option_list_is_rejected() {
    let issues = validate_config(&config(vec![]));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "options");
    assert_eq!(issues[0].option, None);
}

#[test]
fn a_missing_dropdown_label_is_rejected() {
    let config = PlaceholderConfig {
        label: String::new(),
        options: vec![PlaceholderOption::new("[First Name]", "firstname")],
    };

    let issues = validate_config(&config);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "label");
    assert_eq!(issues[0].option, None);
}

#[test]
fn an_unknown_type_is_rejected() {
    let config = config(vec![
        PlaceholderOption::new("[Link]", "link").with_kind("megabutton"),
    ]);

    let issues = validate_config(&config);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].option, Some(0));
    assert_eq!(issues[0].field, "type");
    assert!(issues[0].message.contains("megabutton"));
}

#[test]
fn duplicate_values_are_rejected() {
    let config = config(vec![
        PlaceholderOption::new("[First Name]", "firstname"),
        PlaceholderOption::new("[Also First Name]", "firstname"),
    ]);

    let issues = validate_config(&config);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].option, Some(1));
    assert_eq!(issues[0].field, "value");
}

#[test]
fn every_defect_is_reported_not_just_the_first() {
    let config = PlaceholderConfig {
        label: String::new(),
        options: vec![
            PlaceholderOption::new("", ""),
            PlaceholderOption::new("[Link]", "link").with_kind("nope"),
        ],
    };

    let issues = validate_config(&config);
    assert_eq!(issues.len(), 4);
}
