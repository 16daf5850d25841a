//! Field Service schema and the fixed system instruction sent to the model.

use once_cell::sync::Lazy;

/// Opening marker of the fenced block the model must answer with.
pub const FENCE_OPEN: &str = "```fetchxml";
/// Closing marker of the fenced block.
pub const FENCE_CLOSE: &str = "```";

/// A Dataverse table the model is allowed to query.
pub struct EntitySchema {
    pub logical_name: &'static str,
    /// Web API entity set name (the addressable collection).
    pub collection: &'static str,
    pub description: &'static str,
    pub attributes: &'static [&'static str],
}

pub static SCHEMA: &[EntitySchema] = &[
    EntitySchema {
        logical_name: "msdyn_workorder",
        collection: "msdyn_workorders",
        description: "Work orders. msdyn_systemstatus: 690970000 Unscheduled, 690970001 Scheduled, \
                      690970002 In Progress, 690970003 Completed, 690970004 Posted, 690970005 Canceled.",
        attributes: &[
            "msdyn_name",
            "msdyn_systemstatus",
            "msdyn_substatus",
            "msdyn_priority",
            "msdyn_serviceaccount",
            "msdyn_workordertype",
            "msdyn_primaryincidenttype",
            "msdyn_address1",
            "msdyn_city",
            "msdyn_stateorprovince",
            "msdyn_postalcode",
            "msdyn_datewindowstart",
            "msdyn_datewindowend",
            "ownerid",
            "statecode",
            "createdon",
        ],
    },
    EntitySchema {
        logical_name: "bookableresourcebooking",
        collection: "bookableresourcebookings",
        description: "Scheduled bookings of technicians against work orders.",
        attributes: &[
            "name",
            "starttime",
            "endtime",
            "duration",
            "resource",
            "bookingstatus",
            "msdyn_workorder",
            "statecode",
        ],
    },
    EntitySchema {
        logical_name: "bookableresource",
        collection: "bookableresources",
        description: "Technicians and other schedulable resources.",
        attributes: &["name", "resourcetype", "userid", "timezone", "statecode"],
    },
    EntitySchema {
        logical_name: "account",
        collection: "accounts",
        description: "Customer accounts (service and billing).",
        attributes: &[
            "name",
            "accountnumber",
            "address1_city",
            "address1_stateorprovince",
            "telephone1",
            "emailaddress1",
            "statecode",
        ],
    },
    EntitySchema {
        logical_name: "contact",
        collection: "contacts",
        description: "People at customer accounts.",
        attributes: &[
            "fullname",
            "firstname",
            "lastname",
            "emailaddress1",
            "telephone1",
            "parentcustomerid",
            "address1_city",
            "statecode",
        ],
    },
    EntitySchema {
        logical_name: "msdyn_customerasset",
        collection: "msdyn_customerassets",
        description: "Equipment installed at customer sites.",
        attributes: &[
            "msdyn_name",
            "msdyn_account",
            "msdyn_product",
            "msdyn_parentasset",
            "msdyn_customerassetcategory",
            "statecode",
        ],
    },
    EntitySchema {
        logical_name: "msdyn_incidenttype",
        collection: "msdyn_incidenttypes",
        description: "Types of service incidents a work order can address.",
        attributes: &["msdyn_name", "msdyn_description", "msdyn_estimatedduration", "statecode"],
    },
];

static SYSTEM_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    let mut text = String::from(
        "You translate questions from Dynamics 365 Field Service users into a single \
         Dataverse FetchXML query.\n\nTables you may query:\n",
    );
    for entity in SCHEMA {
        text.push_str(&format!(
            "- {}: {}\n  attributes: {}\n",
            entity.logical_name,
            entity.description,
            entity.attributes.join(", ")
        ));
    }
    text.push_str(
        "\nRules:\n\
         - The outermost <entity> element must be the table the user is asking about.\n\
         - \"Active\" means statecode eq 0.\n\
         - For \"my\" records, filter with <condition attribute=\"ownerid\" operator=\"eq-userid\" />.\n\
         - Use link-entity only when a filter needs a related table.\n\
         - Request at most 50 rows with <fetch top=\"50\">.\n\
         - Respond with the query only, wrapped in one fenced block that opens with ```fetchxml \
         and closes with ```. Do not add any other text.\n",
    );
    text
});

/// Fixed system message describing the schema and the output format.
pub fn system_instruction() -> &'static str {
    SYSTEM_INSTRUCTION.as_str()
}
